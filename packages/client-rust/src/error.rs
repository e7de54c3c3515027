//! Error classification for topology declarations.
//!
//! Every failure surfaces with the fixed prefix of the operation that failed
//! (`failed to declare binding: ...`) and keeps the broker's reply text so
//! callers can match on resource names.

use std::fmt;
use std::time::Duration;

use lapin::protocol::{AMQPError, AMQPErrorKind, AMQPHardError, AMQPSoftError};
use rmq_topology_core::RequestError;

/// The declaration being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    DeclareBinding,
    DeclareExchange,
    DeclareQueue,
}

impl Operation {
    #[must_use]
    pub fn resource(self) -> &'static str {
        match self {
            Self::DeclareBinding => "binding",
            Self::DeclareExchange => "exchange",
            Self::DeclareQueue => "queue",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to declare {}", self.resource())
    }
}

/// Where in the connect/open/declare sequence a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    OpenChannel,
    Declare,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connect => "connecting to broker",
            Self::OpenChannel => "opening channel",
            Self::Declare => "declaring",
        })
    }
}

/// A declaration failed.
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    /// The source exchange or destination queue does not exist.
    #[error("{operation}: Error {code} (not_found): {text}")]
    NotFound {
        operation: Operation,
        code: u16,
        /// Broker reply text without its `NOT_FOUND - ` label.
        text: String,
        /// First quoted resource name in `text`, if any.
        resource: Option<String>,
    },
    /// Dial, authentication or channel-open failure. `detail` renders `cause`.
    #[error("{operation}: {stage}: {detail}")]
    Connectivity {
        operation: Operation,
        stage: Stage,
        detail: String,
        cause: lapin::Error,
    },
    /// Any other broker-reported failure.
    #[error("{operation}: {detail}")]
    Broker {
        operation: Operation,
        detail: String,
        cause: lapin::Error,
    },
    #[error("{operation}: invalid broker url: {reason}")]
    InvalidUrl { operation: Operation, reason: String },
    #[error("{operation}: {stage} timed out after {}ms", .timeout.as_millis())]
    TimedOut {
        operation: Operation,
        stage: Stage,
        timeout: Duration,
    },
    #[error("{operation}: cancelled while {stage}")]
    Cancelled { operation: Operation, stage: Stage },
    #[error("invalid binding request: {0}")]
    InvalidRequest(#[from] RequestError),
}

impl TopologyError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Failures a caller may reasonably retry with backoff.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connectivity { .. } | Self::TimedOut { .. })
    }
}

/// Wraps a broker error with the prefix of `operation`.
///
/// `NOT_FOUND` replies become [`TopologyError::NotFound`]; I/O failures,
/// refused credentials and anything before the declare stage become
/// [`TopologyError::Connectivity`]; the rest is [`TopologyError::Broker`].
#[must_use]
pub fn classify(operation: Operation, stage: Stage, err: lapin::Error) -> TopologyError {
    if let lapin::Error::ProtocolError(amqp) = &err {
        if matches!(amqp.kind(), AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND)) {
            let (_, text) = split_reply_text(amqp.get_message().as_str());
            return TopologyError::NotFound {
                operation,
                code: amqp.get_id(),
                resource: quoted_resource(text).map(str::to_string),
                text: text.to_string(),
            };
        }
    }

    let detail = describe(&err);
    if stage != Stage::Declare || is_connectivity(&err) {
        TopologyError::Connectivity {
            operation,
            stage,
            detail,
            cause: err,
        }
    } else {
        TopologyError::Broker {
            operation,
            detail,
            cause: err,
        }
    }
}

fn is_connectivity(err: &lapin::Error) -> bool {
    match err {
        lapin::Error::IOError(_) | lapin::Error::InvalidConnectionState(_) => true,
        lapin::Error::ProtocolError(amqp) => matches!(
            amqp.kind(),
            AMQPErrorKind::Soft(AMQPSoftError::ACCESSREFUSED)
                | AMQPErrorKind::Hard(
                    AMQPHardError::CONNECTIONFORCED | AMQPHardError::NOTALLOWED
                )
        ),
        _ => false,
    }
}

fn describe(err: &lapin::Error) -> String {
    match err {
        lapin::Error::ProtocolError(amqp) => describe_reply(amqp),
        other => other.to_string(),
    }
}

fn describe_reply(amqp: &AMQPError) -> String {
    let (label, text) = split_reply_text(amqp.get_message().as_str());
    format!("Error {} ({}): {}", amqp.get_id(), label, text)
}

/// Splits `NOT_FOUND - no exchange ...` into `("not_found", "no exchange ...")`.
fn split_reply_text(reply: &str) -> (String, &str) {
    match reply.split_once(" - ") {
        Some((label, text)) if !label.is_empty() && !label.contains(' ') => {
            (label.to_ascii_lowercase(), text)
        }
        _ => ("error".to_string(), reply),
    }
}

fn quoted_resource(text: &str) -> Option<&str> {
    let start = text.find('\'')? + 1;
    let len = text[start..].find('\'')?;
    Some(&text[start..start + len])
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use super::*;

    fn protocol_error(kind: AMQPErrorKind, message: &str) -> lapin::Error {
        lapin::Error::ProtocolError(AMQPError::new(kind, message.into()))
    }

    fn missing_exchange() -> lapin::Error {
        protocol_error(
            AMQPErrorKind::Soft(AMQPSoftError::NOTFOUND),
            "NOT_FOUND - no exchange 'b.ns.some-broker.broker-uid' in vhost '/'",
        )
    }

    #[test]
    fn not_found_keeps_resource_and_code() {
        let err = classify(Operation::DeclareBinding, Stage::Declare, missing_exchange());
        assert!(err.is_not_found());
        assert!(!err.is_transient());
        match &err {
            TopologyError::NotFound { code, resource, .. } => {
                assert_eq!(*code, 404);
                assert_eq!(resource.as_deref(), Some("b.ns.some-broker.broker-uid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.to_string(),
            "failed to declare binding: Error 404 (not_found): no exchange 'b.ns.some-broker.broker-uid' in vhost '/'"
        );
    }

    #[test]
    fn io_failure_is_connectivity() {
        let io = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err = classify(
            Operation::DeclareBinding,
            Stage::Connect,
            lapin::Error::IOError(Arc::new(io)),
        );
        assert!(err.is_transient());
        let text = err.to_string();
        assert!(text.starts_with("failed to declare binding: connecting to broker: "));
        assert!(text.contains("connection refused"));
    }

    #[test]
    fn access_refused_is_connectivity() {
        let err = classify(
            Operation::DeclareBinding,
            Stage::Connect,
            protocol_error(
                AMQPErrorKind::Soft(AMQPSoftError::ACCESSREFUSED),
                "ACCESS_REFUSED - Login was refused using authentication mechanism PLAIN",
            ),
        );
        assert!(matches!(err, TopologyError::Connectivity { stage: Stage::Connect, .. }));
        assert!(err.to_string().contains("Error 403 (access_refused): Login was refused"));
    }

    #[test]
    fn other_declare_failures_are_opaque_but_prefixed() {
        let err = classify(
            Operation::DeclareBinding,
            Stage::Declare,
            protocol_error(
                AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED),
                "PRECONDITION_FAILED - invalid arg 'x-match' for exchange",
            ),
        );
        assert!(matches!(err, TopologyError::Broker { .. }));
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "failed to declare binding: Error 406 (precondition_failed): invalid arg 'x-match' for exchange"
        );
    }

    #[test]
    fn failures_before_declare_are_connectivity() {
        let err = classify(
            Operation::DeclareQueue,
            Stage::OpenChannel,
            protocol_error(
                AMQPErrorKind::Hard(AMQPHardError::CHANNELERROR),
                "CHANNEL_ERROR - second 'channel.open' seen",
            ),
        );
        assert!(err.is_transient());
        assert!(err
            .to_string()
            .starts_with("failed to declare queue: opening channel: Error 504"));
    }

    #[test]
    fn reply_without_label_is_kept_whole() {
        assert_eq!(
            split_reply_text("something odd happened"),
            ("error".to_string(), "something odd happened")
        );
        assert_eq!(quoted_resource("no quotes here"), None);
        assert_eq!(quoted_resource("no queue 'q1' in vhost '/'"), Some("q1"));
    }

    #[test]
    fn timeout_and_cancel_messages() {
        let timed_out = TopologyError::TimedOut {
            operation: Operation::DeclareExchange,
            stage: Stage::Connect,
            timeout: Duration::from_millis(250),
        };
        assert_eq!(
            timed_out.to_string(),
            "failed to declare exchange: connecting to broker timed out after 250ms"
        );
        assert!(timed_out.is_transient());

        let cancelled = TopologyError::Cancelled {
            operation: Operation::DeclareBinding,
            stage: Stage::Declare,
        };
        assert_eq!(
            cancelled.to_string(),
            "failed to declare binding: cancelled while declaring"
        );
        assert!(!cancelled.is_transient());
    }

    #[test]
    fn rendered_cause_is_not_chained_again() {
        let io = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err = classify(
            Operation::DeclareBinding,
            Stage::Connect,
            lapin::Error::IOError(Arc::new(io)),
        );
        assert!(std::error::Error::source(&err).is_none());

        let err = classify(
            Operation::DeclareBinding,
            Stage::Declare,
            protocol_error(
                AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED),
                "PRECONDITION_FAILED - invalid arg 'x-match' for exchange",
            ),
        );
        assert!(std::error::Error::source(&err).is_none());
        let rendered = anyhow::Error::from(err);
        assert_eq!(rendered.chain().count(), 1);
        assert_eq!(
            format!("{rendered:#}"),
            "failed to declare binding: Error 406 (precondition_failed): invalid arg 'x-match' for exchange"
        );
    }

    #[test]
    fn request_errors_convert() {
        let err: TopologyError = RequestError::MissingQueueName.into();
        assert!(matches!(err, TopologyError::InvalidRequest(_)));
    }
}
