//! Shared runtime state for ar-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The reconciliation loop
//! is not owned here: the state only holds a watch receiver on its status.

use std::sync::Arc;
use std::time::Duration;

use ar_announce::{AnnounceStore, SchedulerStatus, TickReport};
use ar_provider::IndexProvider;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// BusMsg (SSE event bus payload)
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Tick(TickReport),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo / DaemonInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Facts fixed at startup.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DaemonInfo {
    pub config_hash: String,
    pub topic: String,
    pub provider_peer_id: Option<String>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub info: DaemonInfo,
    pub store: Arc<dyn AnnounceStore>,
    /// Reconciliation loop phase and last tick.
    pub scheduler: watch::Receiver<SchedulerStatus>,
    /// Local engine, when one is running in-process.
    pub provider: Option<Arc<IndexProvider>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AnnounceStore>,
        scheduler: watch::Receiver<SchedulerStatus>,
        info: DaemonInfo,
        provider: Option<Arc<IndexProvider>>,
    ) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "ar-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            info,
            store,
            scheduler,
            provider,
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(
    bus: broadcast::Sender<BusMsg>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let ts = chrono::Utc::now().timestamp_millis();
                    let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
                }
            }
        }
    })
}

/// Forward every finished tick from the scheduler's status channel to the bus.
/// Ends when the scheduler is dropped.
pub fn spawn_tick_forwarder(
    bus: broadcast::Sender<BusMsg>,
    mut status: watch::Receiver<SchedulerStatus>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_seen: u64 = 0;
        while status.changed().await.is_ok() {
            let report = status.borrow_and_update().last_tick.clone();
            let Some(report) = report else {
                continue;
            };
            if report.tick == last_seen {
                continue;
            }
            last_seen = report.tick;
            if let Some(err) = &report.list_error {
                let _ = bus.send(BusMsg::LogLine {
                    level: "ERROR".to_string(),
                    msg: format!("tick {} could not list front-ends: {err}", report.tick),
                });
            }
            let _ = bus.send(BusMsg::Tick(report));
        }
    })
}
