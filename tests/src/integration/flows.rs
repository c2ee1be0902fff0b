//! # Messaging Flows
//!
//! Two devices exchanging Dagcoin envelopes through in-memory hubs:
//!
//! ```text
//! A.protocol ──hub A──→ bus B ──dispatcher B──→ responder/handler B
//!      ↑                                              │
//!      └──correlator A ←──dispatcher A←── bus A ←──hub B
//! ```

use std::time::Duration;

use serde_json::json;
use shared_bus::BusEvent;
use shared_types::{MessageEnvelope, MessageId};

use dc_03_query_queue::ScriptedQueryExecutor;
use dc_04_device_messaging::{ConnectionResponder, Dispatch, ProtocolError, IS_CONNECTED};

use super::harness::{link, started_pair, Device};

// =============================================================================
// CONNECTION CHECK
// =============================================================================

#[tokio::test]
async fn test_connection_check_end_to_end() {
    let (a, b) = started_pair();

    let peer = a
        .protocol()
        .make_sure_device_is_connected(&b.pairing_code())
        .await
        .unwrap();

    assert_eq!(peer, b.address());
    assert_eq!(a.sent_titles(), vec!["request.is-connected"]);
    assert_eq!(b.sent_titles(), vec!["response.is-connected"]);

    let request = a.hub.sent()[0].envelope().unwrap();
    let response = b.hub.sent()[0].envelope().unwrap();
    assert_eq!(request.id, response.id);

    let handshakes = a.pairing.handshakes();
    assert_eq!(handshakes.len(), 1);
    assert_eq!(handshakes[0].pairing_secret, "invite-bob");
    assert_eq!(handshakes[0].reverse_pairing_secret, "alice-own-secret");
    assert_eq!(a.context.correlator().active_waits(), 0);
}

#[tokio::test]
async fn test_second_check_reuses_the_correspondent() {
    let (a, b) = started_pair();
    a.protocol()
        .make_sure_device_is_connected(&b.pairing_code())
        .await
        .unwrap();
    let mut row = dc_03_query_queue::Row::new();
    row.insert("device_address".into(), json!(b.address()));
    a.executor
        .push(dc_03_query_queue::LOOKUP_DEVICE_BY_PUBKEY, Ok(vec![row]));

    a.protocol()
        .make_sure_device_is_connected(&b.pairing_code())
        .await
        .unwrap();

    assert_eq!(a.pairing.handshakes().len(), 1);
    assert_eq!(a.sent_titles().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_legacy_peer_answers_the_legacy_test() {
    let a = Device::new("alice");
    let b = Device::new("oldbob");
    link(&a, &b);
    a.context.start();

    // bob predates request/response: no responder, legacy titles only
    let _dispatcher = b.context.dispatcher().clone().spawn();
    let responder = ConnectionResponder::new(b.protocol().clone(), b.bus().clone());
    let mut legacy = b.bus().subscribe(shared_bus::EventFilter::event(
        shared_types::EventName::for_title("is-connected"),
    ));
    tokio::spawn(async move {
        while let Some(event) = legacy.recv().await {
            responder.handle(&event).await.unwrap();
        }
    });

    let peer = a
        .protocol()
        .make_sure_device_is_connected(&b.pairing_code())
        .await
        .unwrap();

    assert_eq!(peer, b.address());
    assert_eq!(a.sent_titles(), vec!["request.is-connected", "is-connected"]);
    assert_eq!(b.sent_titles(), vec!["connected"]);
}

#[tokio::test(start_paused = true)]
async fn test_silent_peer_fails_both_checks() {
    let a = Device::new("alice");
    let b = Device::new("gone");
    link(&a, &b);
    a.context.start();
    let subscribers = a.bus().subscriber_count();

    let error = a
        .protocol()
        .make_sure_device_is_connected(&b.pairing_code())
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ProtocolError::Timeout(format!(
            "DEVICE {} DID NOT REPLY TO THE LEGACY CONNECTION TEST",
            b.address()
        ))
    );
    assert_eq!(a.bus().subscriber_count(), subscribers);
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

#[tokio::test]
async fn test_custom_request_round_trip() {
    let (a, b) = started_pair();
    let mut requests = b.requests("balance");
    let responder = b.protocol().clone();
    tokio::spawn(async move {
        while let Some(BusEvent::Protocol { from, envelope }) = requests.recv().await {
            let id = envelope.id.unwrap();
            responder
                .send_response(
                    &from,
                    "balance",
                    json!({"balance": 42, "asked": envelope.message_body}),
                    id,
                )
                .await
                .unwrap();
        }
    });

    let body = a
        .protocol()
        .send_request_and_listen(&b.address(), "balance", json!({"asset": "dag"}))
        .await
        .unwrap();

    assert_eq!(body, json!({"balance": 42, "asked": {"asset": "dag"}}));
}

#[tokio::test]
async fn test_concurrent_requests_never_cross_resolve() {
    let (a, b) = started_pair();
    let mut requests = b.requests("echo");
    let responder = b.protocol().clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while held.len() < 2 {
            if let Some(BusEvent::Protocol { from, envelope }) = requests.recv().await {
                held.push((from, envelope));
            }
        }
        // answer back-to-back, newest first
        for (from, envelope) in held.into_iter().rev() {
            responder
                .send_response(&from, "echo", envelope.message_body, envelope.id.unwrap())
                .await
                .unwrap();
        }
    });

    let peer = b.address();
    let (first, second) = tokio::join!(
        a.protocol().send_request_and_listen(&peer, "echo", json!("first")),
        a.protocol().send_request_and_listen(&peer, "echo", json!("second")),
    );

    assert_eq!(first.unwrap(), json!("first"));
    assert_eq!(second.unwrap(), json!("second"));
}

#[tokio::test(start_paused = true)]
async fn test_mismatched_response_id_times_out() {
    let (a, b) = started_pair();
    let mut requests = b.requests("balance");
    let responder = b.protocol().clone();
    tokio::spawn(async move {
        while let Some(BusEvent::Protocol { from, envelope }) = requests.recv().await {
            let wrong = MessageId(envelope.id.unwrap().value() + 1);
            responder
                .send_response(&from, "balance", json!({"balance": 1}), wrong)
                .await
                .unwrap();
        }
    });
    let started = tokio::time::Instant::now();

    let error = a
        .protocol()
        .send_request_and_listen(&b.address(), "balance", json!({}))
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ProtocolError::Timeout(format!(
            "DID NOT RECEIVE A REPLY TO MESSAGE 0 FROM {} FOR {{}}",
            b.address()
        ))
    );
    assert!(started.elapsed() >= Duration::from_secs(30));
}

#[tokio::test]
async fn test_peer_error_body_is_an_application_error() {
    let (a, b) = started_pair();
    let mut requests = b.requests("pay");
    let responder = b.protocol().clone();
    tokio::spawn(async move {
        while let Some(BusEvent::Protocol { from, envelope }) = requests.recv().await {
            responder
                .send_response(&from, "pay", json!({"error": "insufficient funds"}), envelope.id.unwrap())
                .await
                .unwrap();
        }
    });

    let error = a
        .protocol()
        .send_request_and_listen(&b.address(), "pay", json!({"amount": 10}))
        .await
        .unwrap_err();

    assert!(matches!(error, ProtocolError::Application { .. }));
    assert!(!error.is_retryable());
    assert!(error.to_string().contains("insufficient funds"));
}

// =============================================================================
// INBOUND DEMULTIPLEXING
// =============================================================================

#[tokio::test]
async fn test_foreign_payloads_never_reach_the_correlator() {
    let (a, b) = started_pair();

    let chat = a.context.dispatcher().handle_text(&b.address(), "hello alice").await;
    let other = a
        .context
        .dispatcher()
        .handle_text(&b.address(), r#"{"protocol":"other","title":"x"}"#)
        .await;
    let ours = a
        .context
        .dispatcher()
        .handle_text(
            &b.address(),
            &MessageEnvelope::legacy("ping").to_json().unwrap(),
        )
        .await;

    assert_eq!(chat, Dispatch::NotJson);
    assert_eq!(other, Dispatch::ForeignProtocol("other".into()));
    assert!(matches!(ours, Dispatch::Published(_)));
}

// =============================================================================
// SERIALIZED PERSISTENCE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_pairings_share_one_database_queue() {
    let a = Device::with_executor(
        "alice",
        ScriptedQueryExecutor::with_latency(Duration::from_millis(20)),
    );
    let (b, c, d) = (Device::new("bob"), Device::new("carol"), Device::new("dave"));
    let protocol = a.protocol();

    let (code_b, code_c, code_d) = (b.pairing_code(), c.pairing_code(), d.pairing_code());
    let (rb, rc, rd) = tokio::join!(
        protocol.check_or_pair_device(&code_b),
        protocol.check_or_pair_device(&code_c),
        protocol.check_or_pair_device(&code_d),
    );

    assert!(rb.unwrap().is_confirmed);
    assert!(rc.unwrap().is_confirmed);
    assert!(rd.unwrap().is_confirmed);
    assert_eq!(a.executor.calls().len(), 3);
    assert_eq!(a.executor.max_in_flight(), 1);
    assert_eq!(a.pairing.handshakes().len(), 3);
}

#[tokio::test]
async fn test_responder_uses_the_request_subject() {
    let (a, b) = started_pair();

    let body = a
        .protocol()
        .send_request_and_listen(&b.address(), IS_CONNECTED, json!({}))
        .await
        .unwrap();

    assert_eq!(body, json!({}));
}
