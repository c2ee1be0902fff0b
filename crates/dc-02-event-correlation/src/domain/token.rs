//! Completion channels and correlation tokens.
//!
//! Every wait gets its own completion channel id from a process-wide,
//! monotonically increasing counter. Ids are never reused.

use shared_types::{EventName, MessageId, PeerId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Prefix of private completion channel names.
pub const COMPLETION_CHANNEL_PREFIX: &str = "internal.dagcoin";

static GLOBAL_FACTORY: CompletionChannelFactory = CompletionChannelFactory::new();

/// Identifier of one wait's private completion channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompletionChannelId(u64);

impl CompletionChannelId {
    /// Raw counter value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }

    /// `internal.dagcoin.<n>`
    #[must_use]
    pub fn name(self) -> String {
        format!("{COMPLETION_CHANNEL_PREFIX}.{}", self.0)
    }
}

impl fmt::Display for CompletionChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{COMPLETION_CHANNEL_PREFIX}.{}", self.0)
    }
}

/// Monotonic source of [`CompletionChannelId`]s.
#[derive(Debug)]
pub struct CompletionChannelFactory {
    next: AtomicU64,
}

impl CompletionChannelFactory {
    /// Factory whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// The process-wide factory.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL_FACTORY
    }

    /// Take the next id.
    pub fn next_channel(&self) -> CompletionChannelId {
        CompletionChannelId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for CompletionChannelFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// What one open wait is listening for.
///
/// `message_id` is `None` for sender-only waits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationToken {
    /// Private completion channel of this wait.
    pub channel: CompletionChannelId,
    /// Bus event the wait listens on.
    pub event: EventName,
    /// Required envelope id.
    pub message_id: Option<MessageId>,
    /// Required sender.
    pub peer_id: PeerId,
    /// How long the wait may stay open.
    pub deadline: Duration,
    /// Message of the timeout error.
    pub timeout_message: String,
}

impl CorrelationToken {
    /// The key that must be unique among active waits.
    #[must_use]
    pub fn key(&self) -> WaitKey {
        WaitKey {
            event: self.event.clone(),
            peer_id: self.peer_id.clone(),
            message_id: self.message_id,
        }
    }
}

/// `(event, peer, message id)` triple identifying an active wait.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WaitKey {
    /// Event name.
    pub event: EventName,
    /// Sender.
    pub peer_id: PeerId,
    /// Envelope id, if any.
    pub message_id: Option<MessageId>,
}

impl fmt::Display for WaitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message_id {
            Some(id) => write!(f, "{} from {} #{}", self.event, self.peer_id, id),
            None => write!(f, "{} from {}", self.event, self.peer_id),
        }
    }
}
