//! Persistent store boundary.
//!
//! The reconciliation loop is the only writer of `last_advertisement`; every
//! other field is owned by registration, heartbeat and content-ingestion
//! subsystems that share the same store. Implementations must be at least
//! read-committed and safe to call from several tasks at once (the engine's
//! lister runs concurrently with ticks).

use anyhow::Result;
use ar_schemas::{ContentRecord, FrontEndRegistration};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait AnnounceStore: Send + Sync {
    /// Front-ends whose `last_connection` is strictly after the given instant,
    /// in the store's natural order.
    async fn list_front_ends(
        &self,
        last_connection_after: DateTime<Utc>,
    ) -> Result<Vec<FrontEndRegistration>>;

    /// Every registration regardless of heartbeat, in the store's natural order.
    async fn list_registrations(&self) -> Result<Vec<FrontEndRegistration>>;

    async fn get_front_end(&self, handle: &str) -> Result<Option<FrontEndRegistration>>;

    /// Active content with `created_at >= since`.
    async fn count_active_content_since(&self, since: DateTime<Utc>) -> Result<i64>;

    /// Same predicate as [`count_active_content_since`](Self::count_active_content_since),
    /// insertion order.
    async fn list_active_content_since(&self, since: DateTime<Utc>) -> Result<Vec<ContentRecord>>;

    /// Advance one front-end's watermark. Never moves it backwards.
    async fn update_watermark(&self, handle: &str, at: DateTime<Utc>) -> Result<()>;
}
