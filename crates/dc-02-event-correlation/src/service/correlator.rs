//! Event Correlator - broadcast-to-addressed bridge.
//!
//! Flow:
//! 1. Caller opens a wait (`wait_for`), which subscribes to the bus at once
//! 2. Caller sends its request
//! 3. The first matching protocol event settles the wait
//! 4. The subscription is released on every outcome, including drop

use crate::domain::{
    CompletionChannelFactory, CorrelationError, CorrelationToken, CorrelatorStats, WaitKey,
};
use dc_01_coordination::TimeoutGuard;
use dc_telemetry::{log_peer_event, CORRELATOR_WAITS_ACTIVE};
use parking_lot::Mutex;
use serde_json::Value;
use shared_bus::{BusEvent, EventFilter, InMemoryEventBus, Subscription};
use shared_types::{EventName, MessageId, PeerId};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

type WaitFuture = Pin<Box<dyn Future<Output = Result<Value, CorrelationError>> + Send>>;

/// Opens correlated waits on a shared bus.
pub struct EventCorrelator {
    bus: Arc<InMemoryEventBus>,
    channels: &'static CompletionChannelFactory,
    active: Arc<Mutex<HashSet<WaitKey>>>,
    stats: Arc<CorrelatorStats>,
}

/// One open wait. Resolves to the matched event's `messageBody`.
///
/// Dropping it closes the wait and releases its subscription.
pub struct PendingResponse {
    token: CorrelationToken,
    inner: WaitFuture,
}

/// Keeps the triple reserved while the wait is alive.
struct ActiveWait {
    key: WaitKey,
    active: Arc<Mutex<HashSet<WaitKey>>>,
}

impl Drop for ActiveWait {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
        CORRELATOR_WAITS_ACTIVE.dec();
    }
}

impl EventCorrelator {
    /// Correlator over `bus`, using the process-wide channel factory.
    pub fn new(bus: Arc<InMemoryEventBus>) -> Self {
        Self {
            bus,
            channels: CompletionChannelFactory::global(),
            active: Arc::new(Mutex::new(HashSet::new())),
            stats: Arc::new(CorrelatorStats::default()),
        }
    }

    /// Wait for `event` from `peer_id` carrying envelope id `message_id`.
    ///
    /// The subscription exists when this returns, so the request may be sent
    /// before the returned future is first polled.
    pub fn wait_for(
        &self,
        event: EventName,
        peer_id: PeerId,
        message_id: MessageId,
        deadline: Duration,
        timeout_message: impl Into<String>,
    ) -> PendingResponse {
        self.open(CorrelationToken {
            channel: self.channels.next_channel(),
            event,
            message_id: Some(message_id),
            peer_id,
            deadline,
            timeout_message: timeout_message.into(),
        })
    }

    /// Wait for `event` from `peer_id`, whatever its id. Used by the legacy
    /// connection check, whose replies are not addressed.
    pub fn wait_for_sender(
        &self,
        event: EventName,
        peer_id: PeerId,
        deadline: Duration,
        timeout_message: impl Into<String>,
    ) -> PendingResponse {
        self.open(CorrelationToken {
            channel: self.channels.next_channel(),
            event,
            message_id: None,
            peer_id,
            deadline,
            timeout_message: timeout_message.into(),
        })
    }

    /// Waits currently open.
    #[must_use]
    pub fn active_waits(&self) -> usize {
        self.active.lock().len()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }

    /// The bus waits subscribe to.
    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    fn open(&self, token: CorrelationToken) -> PendingResponse {
        let key = token.key();

        if !self.active.lock().insert(key.clone()) {
            log_peer_event!(
                warn,
                "correlator",
                "Duplicate correlated wait rejected",
                token.peer_id,
                channel = %token.channel,
                event = %token.event
            );
            let error = CorrelationError::DuplicateWait(key.to_string());
            return PendingResponse {
                token,
                inner: Box::pin(std::future::ready(Err(error))),
            };
        }

        CORRELATOR_WAITS_ACTIVE.inc();
        let reservation = ActiveWait {
            key,
            active: self.active.clone(),
        };
        CorrelatorStats::bump(&self.stats.opened);

        let subscription = self.bus.subscribe(EventFilter::event(token.event.clone()));
        log_peer_event!(
            debug,
            "correlator",
            "Correlated wait opened",
            token.peer_id,
            channel = %token.channel,
            event = %token.event,
            message_id = ?token.message_id,
            deadline_ms = token.deadline.as_millis() as u64
        );

        // the deadline runs from here, not from the first poll
        let opened_at = Instant::now();
        let guard =
            TimeoutGuard::new(token.deadline).with_message(token.timeout_message.clone());
        let listening = token.clone();
        let stats = self.stats.clone();

        let inner = Box::pin(async move {
            let _reservation = reservation;
            let channel = listening.channel;

            let listener = listen(subscription, &listening, &stats);
            let outcome = match guard.race_from(opened_at, listener).await {
                Ok(outcome) => outcome,
                Err(expired) => {
                    CorrelatorStats::bump(&stats.timed_out);
                    Err(CorrelationError::from(expired))
                }
            };

            match &outcome {
                Ok(_) => debug!(channel = %channel, "Correlated wait resolved"),
                Err(e) => debug!(channel = %channel, error = %e, "Correlated wait failed"),
            }
            outcome
        });

        PendingResponse { token, inner }
    }
}

async fn listen(
    mut subscription: Subscription,
    token: &CorrelationToken,
    stats: &CorrelatorStats,
) -> Result<Value, CorrelationError> {
    loop {
        let Some(event) = subscription.recv().await else {
            return Err(CorrelationError::BusClosed);
        };

        let BusEvent::Protocol { from, envelope } = event else {
            continue;
        };

        let id_mismatch = token.message_id.is_some() && envelope.id != token.message_id;
        if from != token.peer_id || id_mismatch {
            CorrelatorStats::bump(&stats.ignored);
            trace!(
                channel = %token.channel,
                event = %token.event,
                peer_id = %from,
                message_id = ?envelope.id,
                "Event for another wait ignored"
            );
            continue;
        }

        if let Some(error) = envelope.error_marker() {
            CorrelatorStats::bump(&stats.rejected);
            return Err(CorrelationError::application(
                &token.event,
                &from,
                envelope.id,
                &error,
            ));
        }

        CorrelatorStats::bump(&stats.resolved);
        return Ok(envelope.message_body);
    }
}

impl PendingResponse {
    /// What this wait listens for.
    #[must_use]
    pub fn token(&self) -> &CorrelationToken {
        &self.token
    }
}

impl Future for PendingResponse {
    type Output = Result<Value, CorrelationError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_bus::EventPublisher;
    use shared_types::MessageEnvelope;

    const DEADLINE: Duration = Duration::from_secs(30);

    fn setup() -> (Arc<InMemoryEventBus>, EventCorrelator) {
        let bus = Arc::new(InMemoryEventBus::new());
        let correlator = EventCorrelator::new(bus.clone());
        (bus, correlator)
    }

    fn response(from: &str, subject: &str, id: u64, body: Value) -> BusEvent {
        BusEvent::Protocol {
            from: PeerId::from(from),
            envelope: MessageEnvelope::response(subject, MessageId(id), body),
        }
    }

    #[tokio::test]
    async fn test_resolves_with_message_body() {
        let (bus, correlator) = setup();

        let pending = correlator.wait_for(
            EventName::response("balance"),
            PeerId::from("A"),
            MessageId(1),
            DEADLINE,
            "NO REPLY",
        );
        bus.publish(response("A", "balance", 1, json!({"amount": 5})))
            .await;

        assert_eq!(pending.await, Ok(json!({"amount": 5})));
        assert_eq!(correlator.stats().snapshot().1, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatched_sender_and_id_are_ignored() {
        let (bus, correlator) = setup();

        let pending = correlator.wait_for(
            EventName::response("balance"),
            PeerId::from("A"),
            MessageId(1),
            Duration::from_secs(5),
            "DID NOT RECEIVE A REPLY",
        );
        bus.publish(response("B", "balance", 1, json!({}))).await;
        bus.publish(response("A", "balance", 2, json!({}))).await;

        assert_eq!(
            pending.await,
            Err(CorrelationError::Timeout("DID NOT RECEIVE A REPLY".into()))
        );
        let (_, resolved, _, timed_out, ignored) = correlator.stats().snapshot();
        assert_eq!((resolved, timed_out, ignored), (0, 1, 2));
    }

    #[tokio::test]
    async fn test_error_member_rejects() {
        let (bus, correlator) = setup();

        let pending = correlator.wait_for(
            EventName::response("balance"),
            PeerId::from("A"),
            MessageId(9),
            DEADLINE,
            "NO REPLY",
        );
        bus.publish(response("A", "balance", 9, json!({"error": "no wallet"})))
            .await;

        let error = pending.await.unwrap_err();
        assert_eq!(
            error.to_string(),
            "dagcoin.response.balance LISTENER ERROR: no wallet"
        );
        assert!(matches!(
            error,
            CorrelationError::Application {
                message_id: Some(MessageId(9)),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_error_member_resolves() {
        let (bus, correlator) = setup();

        let pending = correlator.wait_for(
            EventName::response("balance"),
            PeerId::from("A"),
            MessageId(3),
            DEADLINE,
            "NO REPLY",
        );
        bus.publish(response("A", "balance", 3, json!({"error": "", "amount": 1})))
            .await;

        assert_eq!(pending.await, Ok(json!({"error": "", "amount": 1})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_runs_from_opening_not_first_poll() {
        let (_bus, correlator) = setup();
        let opened = Instant::now();

        let pending = correlator.wait_for(
            EventName::response("balance"),
            PeerId::from("A"),
            MessageId(1),
            DEADLINE,
            "NO REPLY",
        );
        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(pending.await, Err(CorrelationError::Timeout("NO REPLY".into())));
        assert_eq!(opened.elapsed(), DEADLINE);
    }

    #[tokio::test]
    async fn test_concurrent_waits_never_cross_resolve() {
        let (bus, correlator) = setup();
        let event = EventName::response("is-connected");

        let first = correlator.wait_for(event.clone(), PeerId::from("A"), MessageId(1), DEADLINE, "A");
        let second = correlator.wait_for(event, PeerId::from("B"), MessageId(2), DEADLINE, "B");

        bus.publish(response("B", "is-connected", 2, json!({"who": "B"})))
            .await;
        bus.publish(response("A", "is-connected", 1, json!({"who": "A"})))
            .await;

        let (a, b) = tokio::join!(first, second);
        assert_eq!(a, Ok(json!({"who": "A"})));
        assert_eq!(b, Ok(json!({"who": "B"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscription_released_on_every_outcome() {
        let (bus, correlator) = setup();
        let before = bus.subscriber_count();

        // success
        let pending = correlator.wait_for(
            EventName::response("x"),
            PeerId::from("A"),
            MessageId(1),
            DEADLINE,
            "late",
        );
        assert_eq!(bus.subscriber_count(), before + 1);
        bus.publish(response("A", "x", 1, json!({}))).await;
        pending.await.unwrap();
        assert_eq!(bus.subscriber_count(), before);

        // timeout
        let pending = correlator.wait_for(
            EventName::response("x"),
            PeerId::from("A"),
            MessageId(2),
            Duration::from_millis(10),
            "late",
        );
        assert!(pending.await.unwrap_err().is_timeout());
        assert_eq!(bus.subscriber_count(), before);

        // dropped without being polled
        let pending = correlator.wait_for(
            EventName::response("x"),
            PeerId::from("A"),
            MessageId(3),
            DEADLINE,
            "late",
        );
        drop(pending);
        assert_eq!(bus.subscriber_count(), before);
        assert_eq!(correlator.active_waits(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_triple_rejected() {
        let (bus, correlator) = setup();
        let event = EventName::response("x");

        let first = correlator.wait_for(event.clone(), PeerId::from("A"), MessageId(1), DEADLINE, "late");
        let second = correlator.wait_for(event, PeerId::from("A"), MessageId(1), DEADLINE, "late");

        assert!(matches!(
            second.await,
            Err(CorrelationError::DuplicateWait(_))
        ));
        assert_eq!(correlator.active_waits(), 1);

        bus.publish(response("A", "x", 1, json!(true))).await;
        assert_eq!(first.await, Ok(json!(true)));
        assert_eq!(correlator.active_waits(), 0);
    }

    #[tokio::test]
    async fn test_sender_only_wait_matches_legacy_reply() {
        let (bus, correlator) = setup();

        let pending = correlator.wait_for_sender(
            EventName::for_title("connected"),
            PeerId::from("A"),
            DEADLINE,
            "NO LEGACY REPLY",
        );
        assert_eq!(pending.token().message_id, None);

        bus.publish(BusEvent::Protocol {
            from: PeerId::from("A"),
            envelope: MessageEnvelope::legacy("connected"),
        })
        .await;

        assert_eq!(pending.await, Ok(Value::Null));
    }

    #[tokio::test]
    async fn test_bus_closed_while_waiting() {
        let (bus, correlator) = setup();

        let pending = correlator.wait_for(
            EventName::response("x"),
            PeerId::from("A"),
            MessageId(1),
            DEADLINE,
            "late",
        );
        drop(correlator);
        drop(bus);

        assert_eq!(pending.await, Err(CorrelationError::BusClosed));
    }

    #[tokio::test]
    async fn test_each_wait_gets_its_own_channel() {
        let (_bus, correlator) = setup();

        let a = correlator.wait_for(EventName::response("x"), PeerId::from("A"), MessageId(1), DEADLINE, "");
        let b = correlator.wait_for(EventName::response("x"), PeerId::from("A"), MessageId(2), DEADLINE, "");

        assert!(b.token().channel > a.token().channel);
        assert!(a.token().channel.name().starts_with("internal.dagcoin."));
    }
}
