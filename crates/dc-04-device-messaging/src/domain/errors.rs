//! # Domain Errors
//!
//! Error taxonomy of the messaging layer. Transport and identity failures
//! are fatal to the current attempt; only timeouts may be retried.

use crate::domain::pairing::PairingState;
use dc_01_coordination::CoordinationError;
use dc_02_event_correlation::CorrelationError;
use dc_03_query_queue::DatabaseError;
use serde_json::Value;
use shared_types::{EnvelopeError, PeerId};
use std::fmt;
use thiserror::Error;

/// Failures of the point-to-point transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The hub refused or lost the message.
    #[error("FAILED DELIVERING TO {peer}: {reason}")]
    Undeliverable {
        /// Intended recipient.
        peer: PeerId,
        /// Hub-reported reason.
        reason: String,
    },

    /// No route to the device.
    #[error("NO ROUTE TO DEVICE {0}")]
    UnknownPeer(PeerId),

    /// Hub connection failure.
    #[error("HUB ERROR: {0}")]
    Hub(String),
}

/// Failures of the identity and pairing primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No correspondent stored under this address.
    #[error("UNKNOWN CORRESPONDENT {0}")]
    UnknownCorrespondent(PeerId),

    /// The primitive refused the operation.
    #[error("{0}")]
    Rejected(String),
}

/// Method name and parameters of a failed call, appended to its error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorContext {
    /// Operation that failed.
    pub method: &'static str,
    /// Its parameters.
    pub parameters: Value,
}

impl ErrorContext {
    /// Context of `method` called with `parameters`.
    pub fn new(method: &'static str, parameters: Value) -> Self {
        Self { method, parameters }
    }

    /// `<message> ON METHOD <method> WITH PARAMETERS: <json>`
    pub fn describe(&self, message: impl fmt::Display) -> String {
        format!("{message} {self}")
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameters.is_null() {
            write!(f, "ON METHOD {}", self.method)
        } else {
            write!(f, "ON METHOD {} WITH PARAMETERS: {}", self.method, self.parameters)
        }
    }
}

/// Errors of the message protocol.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// Bad caller input, rejected before any network traffic.
    #[error("MALFORMED INPUT: {0}")]
    MalformedInput(String),

    /// The transport failed; not retried.
    #[error("{source} {context}")]
    Transport {
        /// Transport failure.
        source: TransportError,
        /// Call that failed.
        context: ErrorContext,
    },

    /// An identity or pairing primitive failed; not retried.
    #[error("{source} {context}")]
    Identity {
        /// Primitive failure.
        source: IdentityError,
        /// Call that failed.
        context: ErrorContext,
    },

    /// The transport kept the message but never acknowledged it.
    #[error("{0}")]
    NotAcknowledged(String),

    /// No reply within the deadline.
    #[error("{0}")]
    Timeout(String),

    /// Every retry timed out.
    #[error("{0}")]
    RetriesExhausted(String),

    /// The peer answered with an error body.
    #[error("{reason}")]
    Application {
        /// Peer that answered.
        peer_id: PeerId,
        /// `<event> LISTENER ERROR: <error>`
        reason: String,
    },

    /// The correspondent lookup failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A pairing step was attempted out of order.
    #[error("INVALID PAIRING TRANSITION {from:?} -> {to:?}")]
    InvalidTransition {
        /// State before.
        from: PairingState,
        /// Requested state.
        to: PairingState,
    },

    /// Internal coordination failure (bus closed, task died, duplicate wait).
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl ProtocolError {
    /// Only timeouts are worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Transport failure with its call context.
    pub fn transport(source: TransportError, context: ErrorContext) -> Self {
        Self::Transport { source, context }
    }

    /// Identity failure with its call context.
    pub fn identity(source: IdentityError, context: ErrorContext) -> Self {
        Self::Identity { source, context }
    }
}

impl From<CoordinationError> for ProtocolError {
    fn from(error: CoordinationError) -> Self {
        match error {
            CoordinationError::Timeout { message } => Self::Timeout(message),
            exhausted @ CoordinationError::RetriesExhausted { .. } => {
                Self::RetriesExhausted(exhausted.to_string())
            }
            CoordinationError::MissingParameter(name) => {
                Self::MalformedInput(format!("PARAMETER {name} UNSPECIFIED"))
            }
            CoordinationError::TaskFailed(reason) => Self::Internal(reason),
        }
    }
}

impl From<CorrelationError> for ProtocolError {
    fn from(error: CorrelationError) -> Self {
        match error {
            CorrelationError::Timeout(message) => Self::Timeout(message),
            CorrelationError::Application {
                peer_id, reason, ..
            } => Self::Application { peer_id, reason },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<EnvelopeError> for ProtocolError {
    fn from(error: EnvelopeError) -> Self {
        Self::MalformedInput(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_context_format() {
        let context = ErrorContext::new("send_message", json!({"subject": "is-connected"}));

        assert_eq!(
            context.describe("HUB DOWN"),
            r#"HUB DOWN ON METHOD send_message WITH PARAMETERS: {"subject":"is-connected"}"#
        );
        assert_eq!(
            ErrorContext::new("await_reverse_pairing", Value::Null).to_string(),
            "ON METHOD await_reverse_pairing"
        );
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        assert!(ProtocolError::Timeout("late".into()).is_retryable());
        assert!(!ProtocolError::MalformedInput("x".into()).is_retryable());
        assert!(!ProtocolError::RetriesExhausted("x".into()).is_retryable());
        assert!(!ProtocolError::transport(
            TransportError::Hub("down".into()),
            ErrorContext::new("send", Value::Null)
        )
        .is_retryable());
    }

    #[test]
    fn test_correlation_errors_map_by_kind() {
        let timeout: ProtocolError = CorrelationError::Timeout("NO REPLY".into()).into();
        assert_eq!(timeout, ProtocolError::Timeout("NO REPLY".into()));

        let closed: ProtocolError = CorrelationError::BusClosed.into();
        assert!(matches!(closed, ProtocolError::Internal(_)));
    }

    #[test]
    fn test_missing_parameter_is_malformed_input() {
        let error: ProtocolError = CoordinationError::MissingParameter("tag").into();
        assert_eq!(
            error,
            ProtocolError::MalformedInput("PARAMETER tag UNSPECIFIED".into())
        );
    }
}
