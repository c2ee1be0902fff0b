//! # `MessageEnvelope`
//!
//! The wire unit exchanged between paired devices over the hub transport.
//!
//! ```text
//! { "protocol": "dagcoin", "title": "<type>.<subject>", "id": <integer>,
//!   "messageType": "request"|"response", "messageBody": <value> }
//! ```
//!
//! Legacy peers send bare envelopes (`{"protocol":"dagcoin","title":"connected"}`)
//! without `id`, `messageType` or `messageBody`, so those fields are optional.

use crate::entities::MessageId;
use crate::errors::EnvelopeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol tag carried by every Dagcoin envelope.
pub const PROTOCOL_TAG: &str = "dagcoin";

/// Prefix of every internal bus event name derived from an envelope title.
const EVENT_PREFIX: &str = "dagcoin.";

/// Kind of an addressed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Expects a correlated response.
    Request,
    /// Answers a request carrying the same id.
    Response,
}

impl MessageType {
    /// Lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of an event on the internal bus (`dagcoin.<title>`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(String);

impl EventName {
    /// Wrap an already-qualified event name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Event name under which an envelope with `title` is republished.
    #[must_use]
    pub fn for_title(title: &str) -> Self {
        Self(format!("{EVENT_PREFIX}{title}"))
    }

    /// `dagcoin.request.<subject>`
    #[must_use]
    pub fn request(subject: &str) -> Self {
        Self::for_title(&format!("{}.{subject}", MessageType::Request))
    }

    /// `dagcoin.response.<subject>`
    #[must_use]
    pub fn response(subject: &str) -> Self {
        Self::for_title(&format!("{}.{subject}", MessageType::Response))
    }

    /// The qualified name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A Dagcoin protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Always [`PROTOCOL_TAG`] for envelopes this crate produces.
    pub protocol: String,

    /// `<messageType>.<subject>` for addressed messages, a bare title for legacy ones.
    pub title: String,

    /// Correlation id; absent on legacy messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,

    /// Absent on legacy messages.
    #[serde(
        rename = "messageType",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub message_type: Option<MessageType>,

    #[serde(rename = "messageBody", default, skip_serializing_if = "Value::is_null")]
    pub message_body: Value,
}

impl MessageEnvelope {
    /// Build an addressed envelope titled `<message_type>.<subject>`.
    pub fn addressed(message_type: MessageType, subject: &str, id: MessageId, body: Value) -> Self {
        Self {
            protocol: PROTOCOL_TAG.to_string(),
            title: format!("{message_type}.{subject}"),
            id: Some(id),
            message_type: Some(message_type),
            message_body: body,
        }
    }

    /// `request.<subject>` envelope.
    pub fn request(subject: &str, id: MessageId, body: Value) -> Self {
        Self::addressed(MessageType::Request, subject, id, body)
    }

    /// `response.<subject>` envelope.
    pub fn response(subject: &str, id: MessageId, body: Value) -> Self {
        Self::addressed(MessageType::Response, subject, id, body)
    }

    /// Bare envelope understood by peers predating request/response.
    pub fn legacy(title: &str) -> Self {
        Self {
            protocol: PROTOCOL_TAG.to_string(),
            title: title.to_string(),
            id: None,
            message_type: None,
            message_body: Value::Null,
        }
    }

    /// Bus event name this envelope is republished under.
    #[must_use]
    pub fn event_name(&self) -> EventName {
        EventName::for_title(&self.title)
    }

    /// Subject part of an addressed title, or the whole title for legacy messages.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self.message_type {
            Some(kind) => self
                .title
                .strip_prefix(kind.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .unwrap_or(&self.title),
            None => &self.title,
        }
    }

    /// Application-level error carried in the body (`{"error": ...}`), if any.
    ///
    /// Empty, zero, `false` and `null` markers mean no error.
    #[must_use]
    pub fn error_marker(&self) -> Option<String> {
        match self.message_body.get("error")? {
            Value::Null | Value::Bool(false) => None,
            Value::String(reason) if reason.is_empty() => None,
            Value::Number(n) if n.as_f64().map_or(false, |v| v == 0.0 || v.is_nan()) => None,
            Value::String(reason) => Some(reason.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Serialize for the transport's text payload.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Invalid(e.to_string()))
    }

    /// Parse a text payload received from a peer.
    ///
    /// # Errors
    ///
    /// - `EnvelopeError::NotJson` - the payload is not JSON at all
    /// - `EnvelopeError::ForeignProtocol` - JSON for some other protocol
    /// - `EnvelopeError::Invalid` - tagged `dagcoin` but malformed
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| EnvelopeError::NotJson(e.to_string()))?;

        match value.get("protocol").and_then(Value::as_str) {
            Some(PROTOCOL_TAG) => {}
            Some(other) => return Err(EnvelopeError::ForeignProtocol(other.to_string())),
            None => return Err(EnvelopeError::ForeignProtocol("<missing>".to_string())),
        }

        serde_json::from_value(value).map_err(|e| EnvelopeError::Invalid(e.to_string()))
    }
}
