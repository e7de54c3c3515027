//! `rmq-topology` core: identity-derived resource names, header-match
//! arguments, and binding requests for a headers-exchange broker.

pub mod arguments;
pub mod error;
pub mod identity;
pub mod naming;
pub mod request;

pub use arguments::{HeaderArguments, OwnerKey, BINDING_KEY, TRIGGER_DLQ_BINDING_KEY};
pub use error::RequestError;
pub use identity::{Broker, Identity, Trigger};
pub use request::{
    make_binding, make_dead_letter_binding, make_dlq_binding, BindingArgs, BindingRequest,
    DeadLetterTarget, DestinationType,
};
