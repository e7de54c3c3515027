//! `rmq-topology` client: declares broker/trigger bindings over AMQP,
//! classifies broker failures, and inspects bindings via the management API.

pub mod client;
pub mod config;
pub mod error;
pub mod management;
pub mod session;
pub mod traits;

pub use client::TopologyClient;
pub use config::{ManagementConfig, TopologyConfig};
pub use error::{Operation, Stage, TopologyError};
pub use management::{BindingInfo, ManagementClient, ManagementError};
pub use session::BrokerSession;
pub use traits::TopologyDeclarer;

pub use tokio_util::sync::CancellationToken;
