//! # Core Context
//!
//! Holds every coordination component and wires them together once.
//!
//! ## Initialization Order
//!
//! ```text
//! Phase 1: CoreConfig (validated)
//! Phase 2: Event bus
//! Phase 3: Query queue (QueuedDatabase, "db-manager")
//! Phase 4: Event correlator (on the bus)
//! Phase 5: Message protocol (transport + pairing + database + correlator)
//! Phase 6: Inbound dispatcher, connection responder
//! ```
//!
//! Nothing is spawned until [`CoreContext::start`].

use crate::container::config::{ConfigError, CoreConfig};
use dc_01_coordination::{PollingLoop, QueueConfig, SerialQueue};
use dc_02_event_correlation::EventCorrelator;
use dc_03_query_queue::{QueryExecutor, QueuedDatabase};
use dc_04_device_messaging::{
    ConnectionResponder, DeviceTransport, InboundDispatcher, MessageProtocol, PairingPrimitives,
};
use shared_bus::InMemoryEventBus;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

/// Every coordination component of one device.
pub struct CoreContext<T, P> {
    config: CoreConfig,
    bus: Arc<InMemoryEventBus>,
    database: QueuedDatabase,
    correlator: Arc<EventCorrelator>,
    protocol: Arc<MessageProtocol<T, P>>,
    dispatcher: Arc<InboundDispatcher>,
    responder: Arc<ConnectionResponder<T, P>>,
}

impl<T, P> CoreContext<T, P>
where
    T: DeviceTransport + 'static,
    P: PairingPrimitives + 'static,
{
    /// Build every component from `config` and the given ports.
    #[instrument(name = "core_init", skip_all)]
    pub fn build(
        config: CoreConfig,
        executor: Arc<dyn QueryExecutor>,
        transport: Arc<T>,
        pairing: Arc<P>,
    ) -> Result<Self, ConfigError> {
        info!("Phase 1: Validating configuration");
        config.validate()?;

        info!(capacity = config.bus.capacity, "Phase 2: Creating event bus");
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.bus.capacity));

        info!(queue = %config.storage.queue_name, "Phase 3: Creating query queue");
        let database = QueuedDatabase::new(executor, config.storage.clone());

        info!("Phase 4: Creating event correlator");
        let correlator = Arc::new(EventCorrelator::new(bus.clone()));

        info!(device_name = %config.messaging.device_name, "Phase 5: Creating message protocol");
        let protocol = Arc::new(MessageProtocol::new(
            config.messaging.clone(),
            transport,
            pairing,
            database.clone(),
            correlator.clone(),
        ));

        info!("Phase 6: Creating inbound dispatcher and connection responder");
        let dispatcher = Arc::new(InboundDispatcher::new(bus.clone()));
        let responder = Arc::new(ConnectionResponder::new(protocol.clone(), bus.clone()));

        Ok(Self {
            config,
            bus,
            database,
            correlator,
            protocol,
            dispatcher,
            responder,
        })
    }

    /// Start inbound dispatching and connection-check answering.
    ///
    /// Both subscriptions are open when this returns.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        let handles = vec![self.dispatcher.clone().spawn(), self.responder.clone().spawn()];
        info!(tasks = handles.len(), "Core context started");
        handles
    }

    /// Wait until the database answers, returning the probes it took.
    pub async fn ready(&self) -> u32 {
        self.database.on_ready().await
    }

    /// A new serial queue. Without `config`, failures are requeued until
    /// they succeed, at least the payment delay apart.
    pub fn serial_queue<A, R, E, F, Fut>(
        &self,
        name: impl Into<String>,
        execute: F,
        config: Option<QueueConfig>,
    ) -> SerialQueue<A, R, E>
    where
        A: Clone + Send + 'static,
        R: Send + 'static,
        E: std::fmt::Display + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let config =
            config.unwrap_or_else(|| QueueConfig::until_success(self.config.payments.minimum_delay));
        SerialQueue::new(name, execute, config)
    }

    /// A polling loop tagged `tag`, not yet running.
    #[must_use]
    pub fn polling(&self, tag: impl Into<String>, sleep_time: Duration) -> PollingLoop {
        PollingLoop::new(tag, sleep_time)
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.bus
    }

    /// Serialized database access.
    #[must_use]
    pub fn database(&self) -> &QueuedDatabase {
        &self.database
    }

    /// Event correlator.
    #[must_use]
    pub fn correlator(&self) -> &Arc<EventCorrelator> {
        &self.correlator
    }

    /// Message protocol.
    #[must_use]
    pub fn protocol(&self) -> &Arc<MessageProtocol<T, P>> {
        &self.protocol
    }

    /// Inbound dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<InboundDispatcher> {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_01_coordination::QueueError;
    use dc_03_query_queue::ScriptedQueryExecutor;
    use dc_04_device_messaging::{InMemoryHub, InMemoryPairing};
    use shared_types::PeerId;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn context(config: CoreConfig) -> Result<CoreContext<InMemoryHub, InMemoryPairing>, ConfigError> {
        CoreContext::build(
            config,
            Arc::new(ScriptedQueryExecutor::new()),
            Arc::new(InMemoryHub::new(PeerId::from("0LOCAL"))),
            Arc::new(InMemoryPairing::new("secret")),
        )
    }

    #[tokio::test]
    async fn test_build_wires_components() {
        let context = context(CoreConfig::default()).unwrap();

        assert_eq!(context.database().queue().name(), "db-manager");
        assert_eq!(context.bus().capacity(), 1000);
        assert_eq!(context.protocol().config().device_name, "Dagcoin Core");
        assert_eq!(context.ready().await, 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = CoreConfig::default();
        config.messaging.message_timeout = Duration::ZERO;

        assert!(matches!(context(config), Err(ConfigError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_start_opens_subscriptions() {
        let context = context(CoreConfig::default()).unwrap();
        let before = context.bus().subscriber_count();

        let handles = context.start();

        assert_eq!(handles.len(), 2);
        assert_eq!(context.bus().subscriber_count(), before + 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_payment_queue_retries_after_the_delay() {
        let context = context(CoreConfig::default()).unwrap();
        let failures = Arc::new(AtomicU32::new(1));
        let queue = context.serial_queue(
            "payments",
            move |amount: u64| {
                let failures = failures.clone();
                async move {
                    if failures
                        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                        .is_ok()
                    {
                        Err("hub offline".to_string())
                    } else {
                        Ok(amount)
                    }
                }
            },
            None,
        );
        let started = Instant::now();

        let paid: Result<u64, QueueError<String>> = queue.enqueue(250).await;

        assert_eq!(paid.unwrap(), 250);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
