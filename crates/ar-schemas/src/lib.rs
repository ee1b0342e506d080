//! Shared record and response types.
//!
//! Plain data only: no IO, no validation. Store rows are decoded into these
//! types by `ar-db`; the daemon serializes the response types as JSON.

use chrono::{DateTime, Utc};
use cid::Cid;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// FrontEndRegistration
// ---------------------------------------------------------------------------

/// One registered retrieval front-end ("autoretrieve" server).
///
/// `handle` doubles as the announcement context identifier. The reconciliation
/// loop reads every field but writes only `last_advertisement`.
#[derive(Clone, PartialEq, Eq)]
pub struct FrontEndRegistration {
    pub id: i64,
    pub handle: String,
    pub token: String,
    /// Base64 of the protobuf-encoded libp2p private key.
    pub private_key: String,
    /// Comma-joined `/…/p2p/<peer id>` multiaddresses.
    pub addresses: String,
    /// Last heartbeat. Mutated by the registration subsystem only.
    pub last_connection: DateTime<Utc>,
    /// Watermark: content created at or after this instant is still pending.
    pub last_advertisement: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FrontEndRegistration {
    /// Individual address strings, in declared order. Empty segments are kept
    /// so callers can report them.
    pub fn address_list(&self) -> Vec<&str> {
        self.addresses.split(',').map(str::trim).collect()
    }
}

impl std::fmt::Debug for FrontEndRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // token and key material never reach logs
        f.debug_struct("FrontEndRegistration")
            .field("id", &self.id)
            .field("handle", &self.handle)
            .field("token", &"<REDACTED>")
            .field("private_key", &"<REDACTED>")
            .field("addresses", &self.addresses)
            .field("last_connection", &self.last_connection)
            .field("last_advertisement", &self.last_advertisement)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ContentRecord
// ---------------------------------------------------------------------------

/// One piece of hosted content. Read-only to the announcement core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub id: i64,
    pub cid: Cid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Peer identity plus reachable addresses, shaped like a libp2p `AddrInfo`
/// JSON document (`{"ID": …, "Addrs": […]}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrInfoView {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Addrs")]
    pub addrs: Vec<String>,
}

/// One row of `GET /v1/autoretrieve/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoretrieveListResponse {
    pub handle: String,
    pub last_connection: DateTime<Utc>,
    pub last_advertisement: DateTime<Utc>,
    /// `None` when the stored address record no longer parses.
    pub addr_info: Option<AddrInfoView>,
}
