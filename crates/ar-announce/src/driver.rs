//! Per-front-end announcement attempt.
//!
//! One call to [`AnnouncementDriver::announce`] = one front-end, one tick:
//! resolve provider identity and retrieval endpoints from the stored address
//! record, skip when nothing is pending, publish, then advance the watermark.
//! The watermark moves only after a successful publish, so any failure
//! leaves the same delta to be retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use ar_schemas::FrontEndRegistration;
use chrono::{DateTime, Utc};
use cid::Cid;
use libp2p::{Multiaddr, PeerId};
use tracing::{debug, info, warn};

use crate::addr::parse_addr_info;
use crate::context::ContextId;
use crate::delta::ContentDelta;
use crate::engine::{AnnouncementEngine, Metadata};
use crate::error::{AnnounceError, ValidationError};
use crate::store::AnnounceStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Published; watermark advanced to `watermark`.
    Announced {
        advertisement: Cid,
        watermark: DateTime<Utc>,
        pending: i64,
    },
    /// Nothing created since the watermark. No side effects.
    NoDelta,
}

/// Provider identity and endpoints to put in an advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalTarget {
    pub provider: PeerId,
    pub addrs: Vec<Multiaddr>,
}

/// Resolve the advertisement target from a front-end's address record.
///
/// Entries that fail to parse are logged and skipped. The LAST parsed peer id
/// wins and every parsed entry contributes its first transport address.
pub fn resolve_retrieval_target(
    front_end: &FrontEndRegistration,
) -> Result<RetrievalTarget, ValidationError> {
    let mut provider: Option<PeerId> = None;
    let mut addrs: Vec<Multiaddr> = Vec::new();

    for entry in front_end.address_list() {
        match parse_addr_info(entry) {
            Ok(info) => {
                provider = Some(info.id);
                match info.addrs.into_iter().next() {
                    Some(addr) => addrs.push(addr),
                    None => warn!(
                        handle = %front_end.handle,
                        address = entry,
                        "address has no transport part, not usable for retrieval"
                    ),
                }
            }
            Err(e) => warn!(
                handle = %front_end.handle,
                address = entry,
                error = %e,
                "could not parse front-end address, skipping entry"
            ),
        }
    }

    let provider = provider.ok_or(ValidationError::NoProviderId)?;
    if addrs.is_empty() {
        return Err(ValidationError::NoRetrievalAddresses);
    }
    Ok(RetrievalTarget { provider, addrs })
}

pub struct AnnouncementDriver {
    store: Arc<dyn AnnounceStore>,
    engine: Arc<dyn AnnouncementEngine>,
    delta: ContentDelta,
    publish_timeout: Duration,
}

impl AnnouncementDriver {
    pub fn new(
        store: Arc<dyn AnnounceStore>,
        engine: Arc<dyn AnnouncementEngine>,
        publish_timeout: Duration,
    ) -> Self {
        let delta = ContentDelta::new(Arc::clone(&store));
        Self {
            store,
            engine,
            delta,
            publish_timeout,
        }
    }

    /// Run one attempt, bounded by the publish timeout.
    pub async fn announce(&self, front_end: &FrontEndRegistration) -> Result<Outcome, AnnounceError> {
        match tokio::time::timeout(self.publish_timeout, self.announce_unbounded(front_end)).await {
            Ok(res) => res,
            Err(_) => Err(AnnounceError::Timeout {
                handle: front_end.handle.clone(),
                timeout: self.publish_timeout,
            }),
        }
    }

    async fn announce_unbounded(
        &self,
        front_end: &FrontEndRegistration,
    ) -> Result<Outcome, AnnounceError> {
        // Everything created from here on is re-announced next time, never lost.
        let started = Utc::now();
        let handle = front_end.handle.as_str();

        let target = resolve_retrieval_target(front_end)?;

        let pending = self.delta.count(front_end.last_advertisement).await?;
        if pending == 0 {
            debug!(handle, "no new CIDs to announce, skipping");
            return Ok(Outcome::NoDelta);
        }
        debug!(handle, pending, "found new CIDs, announcing");

        let context_id = ContextId::from_handle(handle);
        let advertisement = self
            .engine
            .notify_put(&context_id, target.provider, &target.addrs, Metadata::Bitswap)
            .await?;

        self.store
            .update_watermark(handle, started)
            .await
            .map_err(AnnounceError::store)?;

        info!(handle, advertisement = %advertisement, pending, "announced new CIDs");
        Ok(Outcome::Announced {
            advertisement,
            watermark: started,
            pending,
        })
    }
}
