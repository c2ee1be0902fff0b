//! # Message Protocol
//!
//! Pairing handshake and correlated request/response over the device
//! transport.
//!
//! ## Request/response flow
//!
//! 1. Allocate a message id
//! 2. Open a correlated wait on `dagcoin.response.<subject>` for `(peer, id)`
//! 3. Send `request.<subject>` through the transport
//! 4. Resolve with the matching response body, or fail on timeout
//!
//! Transport and identity failures are returned with their call context and
//! never retried here; [`MessageProtocol::send_request_with_retry`] retries
//! timeouts only.

use crate::domain::{
    ErrorContext, MessagingConfig, PairingCode, PairingState, ProtocolError, IS_CONNECTED,
    LEGACY_CONNECTED, LEGACY_IS_CONNECTED, TEXT_PAYLOAD, UNCONFIRMED_CORRESPONDENT_NAME,
};
use crate::ports::{Delivery, DeviceTransport, PairingPrimitives, SavedNotifier};
use dc_01_coordination::{RetryBudget, RetryScheduler};
use dc_02_event_correlation::EventCorrelator;
use dc_03_query_queue::QueuedDatabase;
use dc_telemetry::{log_peer_event, MESSAGES_SENT, PAIRINGS};
use serde_json::{json, Value};
use shared_bus::{BusEvent, EventPublisher};
use shared_types::{
    CorrespondentRecord, EventName, MessageEnvelope, MessageId, MessageIdAllocator, MessageType,
    PeerId,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The Dagcoin device messaging protocol.
///
/// ## Dependencies
///
/// - `T: DeviceTransport` - point-to-point sends
/// - `P: PairingPrimitives` - correspondent storage and pairing handshake
pub struct MessageProtocol<T, P> {
    config: MessagingConfig,
    transport: Arc<T>,
    pairing: Arc<P>,
    database: QueuedDatabase,
    correlator: Arc<EventCorrelator>,
    ids: MessageIdAllocator,
}

impl<T, P> MessageProtocol<T, P>
where
    T: DeviceTransport + 'static,
    P: PairingPrimitives,
{
    /// Protocol sending through `transport`, with correspondent lookups
    /// through `database` and replies matched by `correlator`.
    pub fn new(
        config: MessagingConfig,
        transport: Arc<T>,
        pairing: Arc<P>,
        database: QueuedDatabase,
        correlator: Arc<EventCorrelator>,
    ) -> Self {
        info!(
            device_name = %config.device_name,
            hub = ?config.hub,
            message_timeout_secs = config.message_timeout.as_secs(),
            "Message protocol ready"
        );

        Self {
            config,
            transport,
            pairing,
            database,
            correlator,
            ids: MessageIdAllocator::new(),
        }
    }

    // =========================================================================
    // PAIRING
    // =========================================================================

    /// Return the correspondent behind `pairing_code`, pairing first if it
    /// is not a confirmed correspondent yet.
    ///
    /// A malformed code fails before any lookup or network traffic.
    pub async fn check_or_pair_device(
        &self,
        pairing_code: &str,
    ) -> Result<CorrespondentRecord, ProtocolError> {
        let code = PairingCode::parse(pairing_code)?;

        match self
            .database
            .lookup_device_by_public_key(&code.public_key)
            .await?
        {
            Some(peer) => {
                debug!(peer_id = %peer, public_key = %code.public_key, "Device already paired");
                PairingState::Unpaired.transition(PairingState::Paired)?;
                let record = self.read_correspondent(&peer).await?;
                PAIRINGS.with_label_values(&["existing"]).inc();
                Ok(record)
            }
            None => {
                debug!(public_key = %code.public_key, "Device not yet paired");
                self.pair_device(&code).await
            }
        }
    }

    /// Run the full pairing handshake with the device behind `code`.
    pub async fn pair_device(
        &self,
        code: &PairingCode,
    ) -> Result<CorrespondentRecord, ProtocolError> {
        match self.run_pairing(code).await {
            Ok(record) => {
                PAIRINGS.with_label_values(&["paired"]).inc();
                info!(peer_id = %record.peer_id, hub = %code.hub, "Pairing completed");
                self.correlator
                    .bus()
                    .publish(BusEvent::Paired {
                        peer: record.peer_id.clone(),
                    })
                    .await;
                Ok(record)
            }
            Err(e) => {
                PAIRINGS.with_label_values(&["failed"]).inc();
                error!(public_key = %code.public_key, hub = %code.hub, error = %e, "Pairing failed");
                Err(e)
            }
        }
    }

    async fn run_pairing(&self, code: &PairingCode) -> Result<CorrespondentRecord, ProtocolError> {
        let mut state = PairingState::Unpaired;

        let peer = self
            .pairing
            .register_unconfirmed_peer(&code.public_key, &code.hub, UNCONFIRMED_CORRESPONDENT_NAME)
            .await
            .map_err(|e| {
                ProtocolError::identity(
                    e,
                    ErrorContext::new(
                        "register_unconfirmed_peer",
                        json!({
                            "public_key": code.public_key,
                            "hub": code.hub,
                            "name": UNCONFIRMED_CORRESPONDENT_NAME,
                        }),
                    ),
                )
            })?;
        state = state.transition(PairingState::PairingInitiated)?;
        debug!(peer_id = %peer, ?state, "Unconfirmed correspondent added");

        state = state.transition(PairingState::AwaitingReversePairing)?;
        let reverse = self.pairing.await_reverse_pairing().await.map_err(|e| {
            ProtocolError::identity(
                e,
                ErrorContext::new("await_reverse_pairing", json!({ "device_address": peer })),
            )
        })?;
        debug!(peer_id = %peer, ?state, "Reverse pairing secret ready");

        state = state.transition(PairingState::PairingMessageSent)?;
        self.pairing
            .send_pairing_handshake(
                &code.hub,
                &code.public_key,
                &code.pairing_secret,
                &reverse.pairing_secret,
            )
            .await
            .map_err(|e| {
                ProtocolError::transport(
                    e,
                    ErrorContext::new(
                        "send_pairing_handshake",
                        json!({ "hub": code.hub, "public_key": code.public_key }),
                    ),
                )
            })?;

        state = state.transition(PairingState::Paired)?;
        debug!(peer_id = %peer, ?state, "Pairing message delivered");

        self.read_correspondent(&peer).await
    }

    async fn read_correspondent(&self, peer: &PeerId) -> Result<CorrespondentRecord, ProtocolError> {
        self.pairing.read_correspondent(peer).await.map_err(|e| {
            ProtocolError::identity(
                e,
                ErrorContext::new("read_correspondent", json!({ "device_address": peer })),
            )
        })
    }

    // =========================================================================
    // REQUEST / RESPONSE
    // =========================================================================

    /// Send an addressed `<message_type>.<subject>` message, allocating an id
    /// when none is given. Resolves with the id once the hub acknowledged it;
    /// a message that was only saved fails with
    /// [`ProtocolError::NotAcknowledged`].
    pub async fn send_message(
        &self,
        peer: &PeerId,
        message_type: MessageType,
        subject: &str,
        body: Value,
        message_id: Option<MessageId>,
    ) -> Result<MessageId, ProtocolError> {
        require_addressable(peer, subject)?;

        let id = message_id.unwrap_or_else(|| self.ids.next_id());
        let envelope = MessageEnvelope::addressed(message_type, subject, id, body);
        deliver(self.transport.as_ref(), peer, &envelope, "send_message").await?;

        Ok(id)
    }

    /// `request.<subject>`
    pub async fn send_request(
        &self,
        peer: &PeerId,
        subject: &str,
        body: Value,
        message_id: Option<MessageId>,
    ) -> Result<MessageId, ProtocolError> {
        self.send_message(peer, MessageType::Request, subject, body, message_id)
            .await
    }

    /// `response.<subject>`, echoing the request's id.
    pub async fn send_response(
        &self,
        peer: &PeerId,
        subject: &str,
        body: Value,
        message_id: MessageId,
    ) -> Result<MessageId, ProtocolError> {
        self.send_message(peer, MessageType::Response, subject, body, Some(message_id))
            .await
    }

    /// Send `request.<subject>` and wait for the matching response body.
    ///
    /// The wait is open before the request leaves, so a fast reply cannot
    /// be missed.
    pub async fn send_request_and_listen(
        &self,
        peer: &PeerId,
        subject: &str,
        body: Value,
    ) -> Result<Value, ProtocolError> {
        require_addressable(peer, subject)?;

        let id = self.ids.next_id();
        let pending = self.correlator.wait_for(
            EventName::response(subject),
            peer.clone(),
            id,
            self.config.message_timeout,
            format!("DID NOT RECEIVE A REPLY TO MESSAGE {id} FROM {peer} FOR {body}"),
        );

        debug!(peer_id = %peer, subject, message_id = %id, "Sending request");
        self.send_message(peer, MessageType::Request, subject, body, Some(id))
            .await?;

        debug!(peer_id = %peer, subject, message_id = %id, "Listening for response");
        Ok(pending.await?)
    }

    /// Like [`Self::send_request_and_listen`], re-sending under a fresh id
    /// each time an attempt times out, within `budget`.
    pub async fn send_request_with_retry(
        &self,
        peer: &PeerId,
        subject: &str,
        body: Value,
        budget: &RetryBudget,
    ) -> Result<Value, ProtocolError> {
        require_addressable(peer, subject)?;
        let scheduler = RetryScheduler::new(format!("{subject}@{peer}"), budget.clone());

        // the wait outlives its attempt, so the budget's deadline always fires first
        let wait_deadline = budget.timeout.saturating_mul(2);

        scheduler.run(|| {
            let id = self.ids.next_id();
            let pending = self.correlator.wait_for(
                EventName::response(subject),
                peer.clone(),
                id,
                wait_deadline,
                format!("DID NOT RECEIVE A REPLY TO MESSAGE {id} FROM {peer} FOR {body}"),
            );
            let envelope = MessageEnvelope::request(subject, id, body.clone());
            let transport = self.transport.clone();
            let peer = peer.clone();

            Ok(async move {
                deliver(transport.as_ref(), &peer, &envelope, "send_request_with_retry").await?;
                let reply = pending.await?;
                Ok::<Value, ProtocolError>(reply)
            })
        })
        .await
    }

    // =========================================================================
    // CONNECTION CHECK
    // =========================================================================

    /// Pair if needed, then check the device answers. Peers predating
    /// request/response get the legacy `is-connected` test instead.
    pub async fn make_sure_device_is_connected(
        &self,
        pairing_code: &str,
    ) -> Result<PeerId, ProtocolError> {
        let correspondent = self.check_or_pair_device(pairing_code).await?;
        let peer = correspondent.peer_id;
        debug!(peer_id = %peer, "Received a correspondent");

        match self
            .send_request_and_listen(&peer, IS_CONNECTED, json!({}))
            .await
        {
            Ok(_) => Ok(peer),
            Err(e) => {
                warn!(peer_id = %peer, error = %e, "No response to is-connected, trying the legacy test");
                self.legacy_connection_check(&peer).await?;
                Ok(peer)
            }
        }
    }

    async fn legacy_connection_check(&self, peer: &PeerId) -> Result<(), ProtocolError> {
        let pending = self.correlator.wait_for_sender(
            EventName::for_title(LEGACY_CONNECTED),
            peer.clone(),
            self.config.message_timeout,
            format!("DEVICE {peer} DID NOT REPLY TO THE LEGACY CONNECTION TEST"),
        );

        self.send_legacy(peer, LEGACY_IS_CONNECTED).await?;
        pending.await?;

        info!(peer_id = %peer, "Device is responsive");
        Ok(())
    }

    /// Send an unaddressed legacy message titled `title`.
    pub async fn send_legacy(&self, peer: &PeerId, title: &str) -> Result<(), ProtocolError> {
        if peer.is_empty() {
            return Err(ProtocolError::MalformedInput(
                "CALLING send_legacy: PARAMETER peer UNSPECIFIED".to_string(),
            ));
        }

        let envelope = MessageEnvelope::legacy(title);
        deliver(self.transport.as_ref(), peer, &envelope, "send_legacy").await?;
        Ok(())
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    /// Correlator replies are matched by.
    #[must_use]
    pub fn correlator(&self) -> &Arc<EventCorrelator> {
        &self.correlator
    }

    /// Database correspondents are looked up in.
    #[must_use]
    pub fn database(&self) -> &QueuedDatabase {
        &self.database
    }

    /// The id the next outgoing message will get.
    #[must_use]
    pub fn next_message_id(&self) -> MessageId {
        self.ids.peek()
    }
}

fn require_addressable(peer: &PeerId, subject: &str) -> Result<(), ProtocolError> {
    if peer.is_empty() {
        return Err(ProtocolError::MalformedInput(
            "CALLING send_message: PARAMETER peer UNSPECIFIED".to_string(),
        ));
    }
    if subject.trim().is_empty() {
        return Err(ProtocolError::MalformedInput(
            "CALLING send_message: PARAMETER subject UNSPECIFIED".to_string(),
        ));
    }
    Ok(())
}

async fn deliver<T>(
    transport: &T,
    peer: &PeerId,
    envelope: &MessageEnvelope,
    method: &'static str,
) -> Result<(), ProtocolError>
where
    T: DeviceTransport + ?Sized,
{
    let payload = envelope.to_json()?;
    let (notifier, mut saved) = SavedNotifier::channel();
    let log_saved = || {
        log_peer_event!(
            debug,
            "messaging",
            "A message was saved into the database",
            peer,
            title = %envelope.title
        );
    };

    let send = transport.send_to_peer(peer, TEXT_PAYLOAD, payload, Some(notifier));
    tokio::pin!(send);

    let mut was_saved = false;
    let mut watching = true;
    let outcome = loop {
        tokio::select! {
            biased;
            outcome = &mut send => break outcome,
            notice = &mut saved, if watching => {
                watching = false;
                if notice.is_ok() {
                    was_saved = true;
                    log_saved();
                }
            }
        }
    };
    if watching && saved.try_recv().is_ok() {
        was_saved = true;
        log_saved();
    }

    match outcome {
        Ok(Delivery::Acknowledged) => {
            let kind = envelope.message_type.map_or("legacy", MessageType::as_str);
            MESSAGES_SENT.with_label_values(&[kind]).inc();
            Ok(())
        }
        Ok(Delivery::SavedPending) => {
            let state = if was_saved {
                "WAS SAVED BUT NOT ACKNOWLEDGED"
            } else {
                "WAS NOT ACKNOWLEDGED"
            };
            log_peer_event!(
                warn,
                "messaging",
                "Message not acknowledged",
                peer,
                subject = %envelope.subject(),
                message_id = ?envelope.id,
                saved = was_saved
            );
            Err(ProtocolError::NotAcknowledged(format!(
                "MESSAGE {} TO {peer} {state}",
                envelope.title
            )))
        }
        Err(e) => {
            let error = ProtocolError::transport(
                e,
                ErrorContext::new(
                    method,
                    json!({ "device_address": peer, "kind": TEXT_PAYLOAD, "message": envelope }),
                ),
            );
            log_peer_event!(
                warn,
                "messaging",
                "Send failed",
                peer,
                subject = %envelope.subject(),
                message_id = ?envelope.id,
                error = %error
            );
            Err(error)
        }
    }
}
