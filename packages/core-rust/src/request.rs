//! Binding request model: resolves broker/trigger identities into a fully
//! specified binding declaration. No I/O happens here.

use serde::Serialize;

use crate::arguments::{HeaderArguments, OwnerKey};
use crate::error::RequestError;
use crate::identity::{Broker, Identity, Trigger};
use crate::naming;

/// Caller-supplied inputs for one binding declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingArgs {
    pub routing_key: String,
    /// AMQP URL with credentials and vhost.
    pub broker_url: String,
    /// Management API port. Diagnostic only; never used to declare.
    pub management_port: Option<u16>,
    pub broker: Option<Broker>,
    pub trigger: Option<Trigger>,
    /// Explicit destination queue, required for dead-letter bindings.
    pub queue_name: Option<String>,
}

impl BindingArgs {
    #[must_use]
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_routing_key(mut self, routing_key: impl Into<String>) -> Self {
        self.routing_key = routing_key.into();
        self
    }

    #[must_use]
    pub fn with_management_port(mut self, port: u16) -> Self {
        self.management_port = Some(port);
        self
    }

    #[must_use]
    pub fn with_broker(mut self, broker: Broker) -> Self {
        self.broker = Some(broker);
        self
    }

    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Some(trigger);
        self
    }

    #[must_use]
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    /// Chooses the dead-letter source from the optional trigger field.
    ///
    /// An absent or entirely blank trigger selects the broker's dead-letter
    /// exchange; a complete trigger selects the trigger's own.
    ///
    /// # Errors
    ///
    /// - `RequestError::AmbiguousDeadLetterTarget` if the trigger identity is
    ///   only partially populated.
    /// - `RequestError::MissingObject` / `IncompleteIdentity` if the broker
    ///   is needed but absent or incomplete.
    pub fn dead_letter_target(&self) -> Result<DeadLetterTarget, RequestError> {
        if let Some(trigger) = self.trigger.as_ref().filter(|t| !t.identity.is_blank()) {
            return match trigger.identity.first_empty_field() {
                None => Ok(DeadLetterTarget::Trigger(trigger.identity.clone())),
                Some(field) => Err(RequestError::AmbiguousDeadLetterTarget { field }),
            };
        }
        let broker = self
            .broker
            .as_ref()
            .ok_or(RequestError::MissingObject { role: "broker" })?;
        broker.identity.validate("broker")?;
        Ok(DeadLetterTarget::Broker(broker.identity.clone()))
    }
}

/// Source of a dead-letter binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterTarget {
    /// Events no trigger processed, from the broker's dead-letter exchange.
    Broker(Identity),
    /// Events one trigger failed to deliver, from its own dead-letter exchange.
    Trigger(Identity),
}

impl DeadLetterTarget {
    #[must_use]
    pub fn identity(&self) -> &Identity {
        match self {
            Self::Broker(id) | Self::Trigger(id) => id,
        }
    }

    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::Broker(_) => "broker",
            Self::Trigger(_) => "trigger",
        }
    }

    #[must_use]
    pub fn source_exchange(&self) -> String {
        match self {
            Self::Broker(id) => naming::broker_dead_letter_exchange_name(id),
            Self::Trigger(id) => naming::trigger_dead_letter_exchange_name(id),
        }
    }

    #[must_use]
    pub fn owner_key(&self) -> OwnerKey {
        match self {
            Self::Broker(_) => OwnerKey::Binding,
            Self::Trigger(_) => OwnerKey::TriggerDeadLetter,
        }
    }
}

/// Kind of binding destination. Only queues are bound by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    Queue,
}

impl DestinationType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "queue",
        }
    }
}

/// A fully resolved binding declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingRequest {
    pub source: String,
    pub destination: String,
    pub destination_type: DestinationType,
    pub routing_key: String,
    pub arguments: HeaderArguments,
}

/// Binds a trigger's subscription queue to its broker's primary exchange.
///
/// The destination is always derived from the trigger identity;
/// `args.queue_name` is ignored.
///
/// # Errors
///
/// Returns `RequestError` if the broker or trigger is missing or incomplete,
/// the trigger has no filter map, or a filter key is reserved.
pub fn make_binding(args: &BindingArgs) -> Result<BindingRequest, RequestError> {
    let broker = args
        .broker
        .as_ref()
        .ok_or(RequestError::MissingObject { role: "broker" })?;
    broker.identity.validate("broker")?;

    let trigger = args
        .trigger
        .as_ref()
        .ok_or(RequestError::MissingObject { role: "trigger" })?;
    trigger.identity.validate("trigger")?;

    let filter = trigger.filter.as_ref().ok_or_else(|| RequestError::MissingFilter {
        name: trigger.name().to_string(),
    })?;

    Ok(BindingRequest {
        source: naming::broker_exchange_name(&broker.identity),
        destination: naming::trigger_queue_name(&trigger.identity),
        destination_type: DestinationType::Queue,
        routing_key: args.routing_key.clone(),
        arguments: HeaderArguments::build(OwnerKey::Binding, trigger.name(), filter)?,
    })
}

/// Binds `args.queue_name` to a broker- or trigger-level dead-letter exchange,
/// chosen by [`BindingArgs::dead_letter_target`].
///
/// # Errors
///
/// Returns `RequestError` if the target cannot be determined or the queue
/// name is missing.
pub fn make_dlq_binding(args: &BindingArgs) -> Result<BindingRequest, RequestError> {
    let target = args.dead_letter_target()?;
    let queue = args
        .queue_name
        .as_deref()
        .ok_or(RequestError::MissingQueueName)?;
    make_dead_letter_binding(&target, queue, &args.routing_key)
}

/// Binds `queue` to the dead-letter exchange of `target`.
///
/// # Errors
///
/// Returns `RequestError::IncompleteIdentity` for an incomplete target and
/// `RequestError::MissingQueueName` for an empty queue.
pub fn make_dead_letter_binding(
    target: &DeadLetterTarget,
    queue: &str,
    routing_key: &str,
) -> Result<BindingRequest, RequestError> {
    target.identity().validate(target.role())?;
    if queue.is_empty() {
        return Err(RequestError::MissingQueueName);
    }
    Ok(BindingRequest {
        source: target.source_exchange(),
        destination: queue.to_string(),
        destination_type: DestinationType::Queue,
        routing_key: routing_key.to_string(),
        arguments: HeaderArguments::owner_only(target.owner_key(), &target.identity().name),
    })
}
