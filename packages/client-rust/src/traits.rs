use async_trait::async_trait;
use rmq_topology_core::{make_binding, make_dlq_binding, BindingArgs, BindingRequest};
use tokio_util::sync::CancellationToken;

use crate::error::TopologyError;

/// Issues declarations against a live broker.
/// Implementations: [`crate::TopologyClient`] (AMQP), fakes in tests.
#[async_trait]
pub trait TopologyDeclarer: Send + Sync {
    /// Declare one binding. Idempotent at the broker.
    async fn declare_binding(
        &self,
        broker_url: &str,
        request: &BindingRequest,
        cancel: &CancellationToken,
    ) -> Result<(), TopologyError>;

    /// Declare a durable headers exchange.
    async fn declare_exchange(
        &self,
        broker_url: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TopologyError>;

    /// Declare a durable queue, optionally dead-lettering into `dead_letter_exchange`.
    async fn declare_queue(
        &self,
        broker_url: &str,
        name: &str,
        dead_letter_exchange: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(), TopologyError>;

    /// Resolve and declare a trigger subscription binding.
    /// Malformed arguments fail before any I/O.
    async fn bind(
        &self,
        args: &BindingArgs,
        cancel: &CancellationToken,
    ) -> Result<BindingRequest, TopologyError> {
        let request = make_binding(args)?;
        self.declare_binding(&args.broker_url, &request, cancel).await?;
        Ok(request)
    }

    /// Resolve and declare a dead-letter binding.
    async fn bind_dead_letter(
        &self,
        args: &BindingArgs,
        cancel: &CancellationToken,
    ) -> Result<BindingRequest, TopologyError> {
        let request = make_dlq_binding(args)?;
        self.declare_binding(&args.broker_url, &request, cancel).await?;
        Ok(request)
    }
}
