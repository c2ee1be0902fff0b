//! Two devices in one process, each with its own bus, hub, pairing store
//! and scripted database.

use std::sync::Arc;

use dc_03_query_queue::ScriptedQueryExecutor;
use dc_04_device_messaging::{InMemoryHub, InMemoryPairing, MessageProtocol};
use dc_runtime::{CoreConfig, CoreContext};
use shared_bus::{EventFilter, InMemoryEventBus, Subscription};
use shared_types::{EventName, PeerId};

pub const HUB: &str = "hub.test/bb";

pub struct Device {
    pub public_key: String,
    pub context: CoreContext<InMemoryHub, InMemoryPairing>,
    pub hub: Arc<InMemoryHub>,
    pub pairing: Arc<InMemoryPairing>,
    pub executor: Arc<ScriptedQueryExecutor>,
}

impl Device {
    pub fn new(public_key: &str) -> Self {
        Self::with_executor(public_key, ScriptedQueryExecutor::new())
    }

    pub fn with_executor(public_key: &str, executor: ScriptedQueryExecutor) -> Self {
        let hub = Arc::new(InMemoryHub::new(InMemoryPairing::address_for(public_key)));
        let pairing = Arc::new(InMemoryPairing::new(format!("{public_key}-own-secret")));
        let executor = Arc::new(executor);
        let context = CoreContext::build(
            CoreConfig::default(),
            executor.clone(),
            hub.clone(),
            pairing.clone(),
        )
        .expect("default config is valid");

        Self {
            public_key: public_key.to_string(),
            context,
            hub,
            pairing,
            executor,
        }
    }

    pub fn address(&self) -> PeerId {
        self.hub.address().clone()
    }

    pub fn pairing_code(&self) -> String {
        format!("{}@{HUB}#invite-{}", self.public_key, self.public_key)
    }

    pub fn protocol(&self) -> &Arc<MessageProtocol<InMemoryHub, InMemoryPairing>> {
        self.context.protocol()
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        self.context.bus()
    }

    /// Incoming `dagcoin.request.<subject>` events.
    pub fn requests(&self, subject: &str) -> Subscription {
        self.bus().subscribe(EventFilter::event(EventName::request(subject)))
    }

    /// Titles of every envelope this device sent.
    pub fn sent_titles(&self) -> Vec<String> {
        self.hub
            .sent()
            .iter()
            .filter_map(|m| m.envelope().map(|e| e.title))
            .collect()
    }
}

/// Route each device's messages onto the other's bus.
pub fn link(a: &Device, b: &Device) {
    a.hub.connect(b.address(), b.bus().clone());
    b.hub.connect(a.address(), a.bus().clone());
}

/// Two linked devices, both fully started.
pub fn started_pair() -> (Device, Device) {
    let a = Device::new("alice");
    let b = Device::new("bob");
    link(&a, &b);
    a.context.start();
    b.context.start();
    (a, b)
}
