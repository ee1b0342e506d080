//! Reconciliation loop.
//!
//! ```text
//! Idle ──timer──▶ TickFired ──front-ends listed──▶ Processing ──done──▶ Idle
//!   └──────────────────────── stop ─────────────────────────────▶ Stopped
//! ```
//!
//! Stop is observed only while waiting for the next tick; a tick in progress
//! always runs to completion. Listing failures end the tick, not the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ar_schemas::FrontEndRegistration;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::driver::{AnnouncementDriver, Outcome};
use crate::engine::AnnouncementEngine;
use crate::store::AnnounceStore;

// ---------------------------------------------------------------------------
// Config / status types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub publish_timeout: Duration,
    /// Front-ends processed at once within a tick. 1 = sequential.
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(60),
            publish_timeout: Duration::from_secs(30),
            max_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    TickFired,
    Processing,
    Stopped,
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub online: usize,
    pub announced: usize,
    pub no_delta: usize,
    pub skipped_invalid: usize,
    pub failed: usize,
    /// Set when the online front-ends could not be listed.
    pub list_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub phase: SchedulerPhase,
    pub last_tick: Option<TickReport>,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            last_tick: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Per-front-end attempt
// ---------------------------------------------------------------------------

enum Disposition {
    Announced,
    NoDelta,
    SkippedInvalid,
    Failed,
}

/// One front-end's attempt. Owns its inputs so the future is `'static` and
/// logs its own result as soon as it finishes.
async fn announce_one(driver: Arc<AnnouncementDriver>, fe: FrontEndRegistration) -> Disposition {
    let handle = fe.handle.as_str();
    match driver.announce(&fe).await {
        Ok(Outcome::Announced { .. }) => Disposition::Announced,
        Ok(Outcome::NoDelta) => Disposition::NoDelta,
        Err(e) if e.is_validation() => {
            warn!(handle, error = %e, "skipping front-end with unusable address record");
            Disposition::SkippedInvalid
        }
        Err(e) => {
            error!(handle, error = %e, "failed to announce front-end, retrying next tick");
            Disposition::Failed
        }
    }
}

// ---------------------------------------------------------------------------
// ReconciliationScheduler
// ---------------------------------------------------------------------------

pub struct ReconciliationScheduler {
    store: Arc<dyn AnnounceStore>,
    driver: Arc<AnnouncementDriver>,
    config: SchedulerConfig,
    cancel: CancellationToken,
    status_tx: watch::Sender<SchedulerStatus>,
    ticks: AtomicU64,
}

impl ReconciliationScheduler {
    pub fn new(
        store: Arc<dyn AnnounceStore>,
        engine: Arc<dyn AnnouncementEngine>,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        let driver = Arc::new(AnnouncementDriver::new(
            Arc::clone(&store),
            engine,
            config.publish_timeout,
        ));
        let (status_tx, _rx) = watch::channel(SchedulerStatus::default());
        Self {
            store,
            driver,
            config,
            cancel,
            status_tx,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerStatus> {
        self.status_tx.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_phase(&self, phase: SchedulerPhase) {
        self.status_tx.send_modify(|s| s.phase = phase);
    }

    /// Run exactly one reconciliation pass over the online front-ends.
    pub async fn run_tick(&self) -> TickReport {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let started_at = Utc::now();
        self.set_phase(SchedulerPhase::TickFired);

        let online_cutoff =
            started_at - chrono::Duration::milliseconds(self.config.tick_interval.as_millis() as i64);

        let mut report = TickReport {
            tick,
            started_at,
            finished_at: started_at,
            online: 0,
            announced: 0,
            no_delta: 0,
            skipped_invalid: 0,
            failed: 0,
            list_error: None,
        };

        match self.store.list_front_ends(online_cutoff).await {
            Err(e) => {
                let msg = format!("{e:#}");
                error!(tick, error = %msg, "failed to list online front-ends, retrying next tick");
                report.list_error = Some(msg);
            }
            Ok(front_ends) if front_ends.is_empty() => {
                info!(tick, "no autoretrieves online");
            }
            Ok(front_ends) => {
                report.online = front_ends.len();
                self.set_phase(SchedulerPhase::Processing);
                self.process(front_ends, &mut report).await;
            }
        }

        report.finished_at = Utc::now();
        info!(
            tick,
            online = report.online,
            announced = report.announced,
            no_delta = report.no_delta,
            skipped_invalid = report.skipped_invalid,
            failed = report.failed,
            "tick complete"
        );
        let last = report.clone();
        self.status_tx.send_modify(|s| {
            s.phase = SchedulerPhase::Idle;
            s.last_tick = Some(last);
        });
        report
    }

    async fn process(&self, front_ends: Vec<FrontEndRegistration>, report: &mut TickReport) {
        let driver = Arc::clone(&self.driver);
        let dispositions: Vec<Disposition> = stream::iter(front_ends)
            .map(move |fe| announce_one(Arc::clone(&driver), fe))
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for d in dispositions {
            match d {
                Disposition::Announced => report.announced += 1,
                Disposition::NoDelta => report.no_delta += 1,
                Disposition::SkippedInvalid => report.skipped_invalid += 1,
                Disposition::Failed => report.failed += 1,
            }
        }
    }

    /// Tick until the cancellation token fires. The first tick is immediate.
    pub async fn run(&self) {
        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            max_concurrency = self.config.max_concurrency,
            "reconciliation loop started"
        );
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_tick().await;
                }
            }
        }

        self.set_phase(SchedulerPhase::Stopped);
        info!("reconciliation loop stopped");
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
