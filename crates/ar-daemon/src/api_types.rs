//! Response types for the ar-daemon HTTP endpoints.
//!
//! No business logic lives here. The list endpoint's row type is shared with
//! other consumers and lives in `ar-schemas`.

use ar_announce::{SchedulerPhase, TickReport};
use serde::Serialize;

pub use ar_schemas::AutoretrieveListResponse;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub phase: SchedulerPhase,
    pub last_tick: Option<TickReport>,
    pub config_hash: String,
    pub topic: String,
    /// Host identity the advertisements are signed with.
    pub provider_peer_id: Option<String>,
    /// Current head of the local advertisement chain.
    pub advertisement_head: Option<String>,
    pub advertisement_entries: Option<usize>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
