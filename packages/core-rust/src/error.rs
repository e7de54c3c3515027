//! Precondition errors raised while assembling a binding request.
//!
//! Every variant is detected before any network I/O takes place.

/// A binding request could not be assembled from the supplied arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("missing {role} for binding request")]
    MissingObject { role: &'static str },
    #[error("{role} identity is incomplete: {field} is empty")]
    IncompleteIdentity {
        role: &'static str,
        field: &'static str,
    },
    #[error("trigger {name:?} has no filter attributes map")]
    MissingFilter { name: String },
    #[error("filter attribute {key:?} is reserved for binding arguments")]
    ReservedFilterKey { key: String },
    #[error("dead-letter binding requires an explicit destination queue name")]
    MissingQueueName,
    #[error("trigger identity is partially populated ({field} is empty); cannot choose a dead-letter source")]
    AmbiguousDeadLetterTarget { field: &'static str },
}
