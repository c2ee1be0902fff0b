//! # Coordination Properties
//!
//! Queue ordering, retry budgets and correlation across the dc-01 and
//! dc-02 crates, checked against virtual time.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::time::{sleep, Instant};

use dc_01_coordination::{
    retry_timed, timed, Attempts, CoordinationError, QueueConfig, QueueError, RetryBudget,
    SerialQueue,
};
use dc_02_event_correlation::{CorrelationError, EventCorrelator};
use shared_bus::{BusEvent, EventPublisher, InMemoryEventBus};
use shared_types::{EventName, MessageEnvelope, MessageId, PeerId};

/// `(argument, started, finished)` per execution.
type Timeline = Arc<Mutex<Vec<(u32, Instant, Instant)>>>;

fn recording_queue(
    config: QueueConfig,
    failures: Vec<u32>,
) -> (SerialQueue<u32, u32, String>, Timeline) {
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
    let failures = Arc::new(Mutex::new(failures));
    let log = timeline.clone();

    let queue = SerialQueue::new(
        "recording",
        move |n: u32| {
            let log = log.clone();
            let failures = failures.clone();
            async move {
                let started = Instant::now();
                sleep(Duration::from_millis(10)).await;
                log.lock().push((n, started, Instant::now()));

                let mut failures = failures.lock();
                match failures.iter().position(|f| *f == n) {
                    Some(index) => {
                        failures.remove(index);
                        Err(format!("operation {n} failed"))
                    }
                    None => Ok(n * 10),
                }
            }
        },
        config,
    );

    (queue, timeline)
}

// =============================================================================
// SERIAL QUEUE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reject_queue_settles_in_order() {
    let (queue, timeline) = recording_queue(QueueConfig::fifo(), vec![2]);

    let (first, second, third) =
        tokio::join!(queue.enqueue(1), queue.enqueue(2), queue.enqueue(3));

    assert_eq!(first.unwrap(), 10);
    assert!(matches!(
        second,
        Err(QueueError::Rejected { sequence: 1, ref error, .. }) if error == "operation 2 failed"
    ));
    assert_eq!(third.unwrap(), 30);

    let timeline = timeline.lock();
    let order: Vec<u32> = timeline.iter().map(|(n, _, _)| *n).collect();
    assert_eq!(order, vec![1, 2, 3]);
    let (_, _, second_finished) = timeline[1];
    let (_, third_started, _) = timeline[2];
    assert!(third_started >= second_finished);
}

#[tokio::test(start_paused = true)]
async fn test_until_success_requeues_behind_other_entries() {
    let delay = Duration::from_secs(5);
    let (queue, timeline) = recording_queue(QueueConfig::until_success(delay), vec![1]);

    let (first, second) = tokio::join!(queue.enqueue(1), queue.enqueue(2));

    assert_eq!(first.unwrap(), 10);
    assert_eq!(second.unwrap(), 20);

    let timeline = timeline.lock();
    let order: Vec<u32> = timeline.iter().map(|(n, _, _)| *n).collect();
    assert_eq!(order, vec![1, 2, 1]);
    let (_, _, failed_at) = timeline[0];
    let (_, retried_at, _) = timeline[2];
    assert!(retried_at.duration_since(failed_at) >= delay);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_requeue_gives_up() {
    let config = QueueConfig::until_success(Duration::from_secs(1)).with_max_attempts(2);
    let (queue, timeline) = recording_queue(config, vec![7, 7, 7]);

    let outcome = queue.enqueue(7).await;

    assert!(matches!(outcome, Err(QueueError::Rejected { .. })));
    assert_eq!(timeline.lock().len(), 2);
}

// =============================================================================
// BOUNDED WAITS AND RETRIES
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_guard_passes_the_operation_result_through() {
    let settled = timed(async { Err::<u8, _>("declined") }, Duration::from_secs(1), None).await;
    assert_eq!(settled.unwrap(), Err("declined"));

    let late = timed(
        async {
            sleep(Duration::from_secs(2)).await;
            1u8
        },
        Duration::from_secs(1),
        Some("TOO SLOW"),
    )
    .await;
    assert_eq!(
        late.unwrap_err(),
        CoordinationError::Timeout {
            message: "TOO SLOW".into()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_retry_budget_bounds_producer_calls() {
    for retries in [0u32, 1, 3] {
        let calls = Arc::new(AtomicU32::new(0));
        let budget = RetryBudget::new(Duration::from_millis(100), Attempts::Limited(retries));
        let counter = calls.clone();

        let outcome: Result<(), CoordinationError> = retry_timed("never-settles", &budget, || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(std::future::pending::<Result<(), CoordinationError>>())
        })
        .await;

        assert!(matches!(
            outcome,
            Err(CoordinationError::RetriesExhausted { attempts, .. }) if attempts == retries + 1
        ));
        assert_eq!(calls.load(Ordering::SeqCst), retries + 1);
    }
}

// =============================================================================
// EVENT CORRELATION
// =============================================================================

#[tokio::test]
async fn test_back_to_back_responses_resolve_their_own_waits() {
    let bus = Arc::new(InMemoryEventBus::new());
    let correlator = EventCorrelator::new(bus.clone());
    let peer = PeerId::from("0PEER");
    let event = EventName::response("quote");
    let deadline = Duration::from_secs(5);

    let first = correlator.wait_for(event.clone(), peer.clone(), MessageId(1), deadline, "first");
    let second = correlator.wait_for(event, peer.clone(), MessageId(2), deadline, "second");

    for id in [2, 1] {
        bus.publish(BusEvent::Protocol {
            from: peer.clone(),
            envelope: MessageEnvelope::response("quote", MessageId(id), json!({ "id": id })),
        })
        .await;
    }

    assert_eq!(first.await.unwrap(), json!({"id": 1}));
    assert_eq!(second.await.unwrap(), json!({"id": 2}));
    assert_eq!(correlator.active_waits(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_response_from_another_peer_is_not_accepted() {
    let bus = Arc::new(InMemoryEventBus::new());
    let correlator = EventCorrelator::new(bus.clone());

    let pending = correlator.wait_for(
        EventName::response("quote"),
        PeerId::from("0EXPECTED"),
        MessageId(4),
        Duration::from_secs(5),
        "NO QUOTE",
    );
    bus.publish(BusEvent::Protocol {
        from: PeerId::from("0IMPOSTOR"),
        envelope: MessageEnvelope::response("quote", MessageId(4), json!({})),
    })
    .await;

    assert_eq!(pending.await, Err(CorrelationError::Timeout("NO QUOTE".into())));
}
