//! Messaging configuration.

use std::time::Duration;

/// How long a request waits for its response.
pub const DEFAULT_MESSAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Name this device announces itself with.
pub const DEFAULT_DEVICE_NAME: &str = "Dagcoin Core";

/// Name given to a correspondent until the peer tells us its own.
pub const UNCONFIRMED_CORRESPONDENT_NAME: &str = "New";

/// Transport payload kind of every protocol message.
pub const TEXT_PAYLOAD: &str = "text";

/// Subject of the request/response connection check.
pub const IS_CONNECTED: &str = "is-connected";

/// Title of the legacy connection check sent to peers.
pub const LEGACY_IS_CONNECTED: &str = "is-connected";

/// Title of the legacy reply to [`LEGACY_IS_CONNECTED`].
pub const LEGACY_CONNECTED: &str = "connected";

/// Settings of a [`crate::MessageProtocol`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingConfig {
    /// Deadline of correlated waits and of the legacy connection check.
    pub message_timeout: Duration,
    /// Name this device announces itself with.
    pub device_name: String,
    /// Hub this device is connected to, if known.
    pub hub: Option<String>,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            message_timeout: DEFAULT_MESSAGE_TIMEOUT,
            device_name: DEFAULT_DEVICE_NAME.to_string(),
            hub: None,
        }
    }
}
