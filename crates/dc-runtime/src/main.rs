//! # Dagcoin Core Runtime
//!
//! Runs two devices in one process, connected through in-memory hubs:
//!
//! ```text
//! [device A] ──InMemoryHub──→ bus B ──dispatcher──→ responder B
//!     ↑                                                  │
//!     └──correlator A ←──dispatcher── bus A ←──InMemoryHub┘
//! ```
//!
//! ## Startup Sequence
//!
//! 1. Initialize telemetry (`DC_*` environment variables)
//! 2. Resolve configuration (defaults, then environment)
//! 3. Build both contexts and start their dispatchers and responders
//! 4. Wait for the database, pair A with B and check B answers
//! 5. Dump metrics and exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use dc_03_query_queue::{QueryError, ScriptedQueryExecutor, READY_CHECK};
use dc_04_device_messaging::{InMemoryHub, InMemoryPairing};
use dc_runtime::{CoreConfig, CoreContext, EnvSource, LayeredConfig, StaticSource};
use dc_telemetry::{encode_metrics, init_telemetry, TelemetryConfig};
use shared_types::PeerId;

const DEVICE_A_KEY: &str = "devicea";
const DEVICE_B_KEY: &str = "deviceb";
const DEMO_HUB: &str = "hub.dagcoin.local/bb";

type DemoContext = CoreContext<InMemoryHub, InMemoryPairing>;

struct Device {
    context: DemoContext,
    hub: Arc<InMemoryHub>,
}

fn device(config: CoreConfig, public_key: &str, executor: ScriptedQueryExecutor) -> Result<Device> {
    let hub = Arc::new(InMemoryHub::new(InMemoryPairing::address_for(public_key)));
    let context = CoreContext::build(
        config,
        Arc::new(executor),
        hub.clone(),
        Arc::new(InMemoryPairing::new(format!("{public_key}-secret"))),
    )
    .with_context(|| format!("building device {public_key}"))?;

    Ok(Device { context, hub })
}

async fn load_config() -> Result<CoreConfig> {
    let mut layers = LayeredConfig::new(
        StaticSource::new("conf").with("deviceName", "Dagcoin Core").with("hub", DEMO_HUB),
    );
    layers.add_source(EnvSource::dagcoin())?;

    CoreConfig::resolve(&layers)
        .await
        .context("resolving configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let _telemetry = init_telemetry(TelemetryConfig::from_env()).context("initializing telemetry")?;

    let config = load_config().await?;
    info!(
        device_name = %config.messaging.device_name,
        message_timeout_ms = config.messaging.message_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    // Device A's database needs a moment before it accepts statements.
    let storage = ScriptedQueryExecutor::new();
    storage.fail_times(READY_CHECK, 1, QueryError::Unavailable("opening database".into()));
    let mut fast_probe = config.clone();
    fast_probe.storage.ready_check_interval = Duration::from_millis(200);

    let a = device(fast_probe, DEVICE_A_KEY, storage)?;
    let b = device(config, DEVICE_B_KEY, ScriptedQueryExecutor::new())?;

    a.hub.connect(b.hub.address().clone(), b.context.bus().clone());
    b.hub.connect(a.hub.address().clone(), a.context.bus().clone());

    let mut tasks = a.context.start();
    tasks.extend(b.context.start());

    let probes = a.context.ready().await;
    info!(probes, "Device A database ready");

    let correspondents = a.context.polling("correspondent-count", Duration::from_secs(60));
    let database = a.context.database().clone();
    let poller = correspondents.spawn(move || {
        let database = database.clone();
        async move {
            let list = database.correspondent_list().await?;
            info!(count = list.len(), "Correspondents");
            Ok::<(), dc_03_query_queue::DatabaseError>(())
        }
    });

    let pairing_code = format!("{DEVICE_B_KEY}@{DEMO_HUB}#0000");
    match a
        .context
        .protocol()
        .make_sure_device_is_connected(&pairing_code)
        .await
    {
        Ok(peer) => info!(peer_id = %peer, "Device B is connected"),
        Err(e) => warn!(error = %e, "Device B did not answer"),
    }

    let sent: Vec<PeerId> = a.hub.sent().into_iter().map(|m| m.to).collect();
    info!(messages = sent.len(), "Messages sent by device A");

    poller.stop().await;
    for task in tasks {
        task.abort();
    }

    match encode_metrics() {
        Ok(metrics) => info!("Metrics:\n{metrics}"),
        Err(e) => warn!(error = %e, "Could not encode metrics"),
    }

    Ok(())
}
