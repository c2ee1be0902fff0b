//! Correlation error types.

use dc_01_coordination::CoordinationError;
use shared_types::{EventName, MessageId, PeerId};
use thiserror::Error;

/// Ways a correlated wait can end without a body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CorrelationError {
    /// No matching event arrived in time.
    #[error("{0}")]
    Timeout(String),

    /// The matching event carried an `error` member.
    #[error("{reason}")]
    Application {
        /// Event that matched.
        event: EventName,
        /// Sender of the event.
        peer_id: PeerId,
        /// Envelope id, if the wait was addressed.
        message_id: Option<MessageId>,
        /// `<event> LISTENER ERROR: <error>`
        reason: String,
    },

    /// The bus went away while waiting.
    #[error("event bus closed while waiting")]
    BusClosed,

    /// Another wait is already open on the same triple.
    #[error("a wait is already open for {0}")]
    DuplicateWait(String),
}

impl CorrelationError {
    /// Build the application error for a matched event.
    pub fn application(
        event: &EventName,
        peer_id: &PeerId,
        message_id: Option<MessageId>,
        error: &str,
    ) -> Self {
        Self::Application {
            event: event.clone(),
            peer_id: peer_id.clone(),
            message_id,
            reason: format!("{event} LISTENER ERROR: {error}"),
        }
    }

    /// True for deadline expiry only.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<CoordinationError> for CorrelationError {
    fn from(error: CoordinationError) -> Self {
        match error {
            CoordinationError::Timeout { message } => Self::Timeout(message),
            other => Self::Timeout(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_reason_format() {
        let error = CorrelationError::application(
            &EventName::response("balance"),
            &PeerId::from("0PEER"),
            Some(MessageId(3)),
            "no wallet",
        );

        assert_eq!(
            error.to_string(),
            "dagcoin.response.balance LISTENER ERROR: no wallet"
        );
        assert!(!error.is_timeout());
    }

    #[test]
    fn test_coordination_timeout_keeps_message() {
        let error: CorrelationError = CoordinationError::Timeout {
            message: "NO REPLY".into(),
        }
        .into();

        assert_eq!(error, CorrelationError::Timeout("NO REPLY".into()));
    }
}
