//! "New content since watermark" computation.
//!
//! [`ContentDelta`] is the single definition of the delta relation
//! (`active && created_at >= watermark`). The scheduler uses it as a cheap
//! pre-check and [`ContentLister`] uses the same value when the engine asks
//! for the entries of an advertisement. The two calls happen at different
//! times, so the lister may observe a superset of what the pre-check counted.

use std::sync::Arc;

use ar_schemas::ContentRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::context::ContextId;
use crate::engine::MultihashLister;
use crate::error::AnnounceError;
use crate::store::AnnounceStore;

pub type Multihash = cid::multihash::Multihash<64>;

// ---------------------------------------------------------------------------
// MultihashIter
// ---------------------------------------------------------------------------

/// Finite, single-pass sequence of multihashes in store order.
///
/// Query failures surface from the call that builds the iterator, so `None`
/// from [`next`](Iterator::next) always means end-of-sequence.
#[derive(Debug)]
pub struct MultihashIter {
    inner: std::vec::IntoIter<Multihash>,
}

impl MultihashIter {
    pub fn new(hashes: Vec<Multihash>) -> Self {
        Self {
            inner: hashes.into_iter(),
        }
    }

    pub fn from_records(records: &[ContentRecord]) -> Self {
        Self::new(records.iter().map(|r| r.cid.hash().to_owned()).collect())
    }
}

impl Iterator for MultihashIter {
    type Item = Multihash;

    fn next(&mut self) -> Option<Multihash> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for MultihashIter {}

// ---------------------------------------------------------------------------
// ContentDelta
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ContentDelta {
    store: Arc<dyn AnnounceStore>,
}

impl ContentDelta {
    pub fn new(store: Arc<dyn AnnounceStore>) -> Self {
        Self { store }
    }

    pub async fn count(&self, watermark: DateTime<Utc>) -> Result<i64, AnnounceError> {
        self.store
            .count_active_content_since(watermark)
            .await
            .map_err(AnnounceError::store)
    }

    pub async fn has_delta(&self, watermark: DateTime<Utc>) -> Result<bool, AnnounceError> {
        Ok(self.count(watermark).await? > 0)
    }

    pub async fn enumerate(&self, watermark: DateTime<Utc>) -> Result<MultihashIter, AnnounceError> {
        let records = self
            .store
            .list_active_content_since(watermark)
            .await
            .map_err(AnnounceError::store)?;
        Ok(MultihashIter::from_records(&records))
    }
}

// ---------------------------------------------------------------------------
// ContentLister
// ---------------------------------------------------------------------------

/// Engine-facing lister: context id → front-end → delta since its watermark.
///
/// Read-only against the store; safe to run alongside a tick.
#[derive(Clone)]
pub struct ContentLister {
    store: Arc<dyn AnnounceStore>,
    delta: ContentDelta,
}

impl ContentLister {
    pub fn new(store: Arc<dyn AnnounceStore>) -> Self {
        let delta = ContentDelta::new(Arc::clone(&store));
        Self { store, delta }
    }
}

#[async_trait]
impl MultihashLister for ContentLister {
    async fn list(&self, context_id: &ContextId) -> Result<MultihashIter, AnnounceError> {
        let handle = context_id.to_handle()?;
        let front_end = self
            .store
            .get_front_end(handle)
            .await
            .map_err(AnnounceError::store)?
            .ok_or_else(|| AnnounceError::UnknownContext(handle.to_string()))?;

        let iter = self.delta.enumerate(front_end.last_advertisement).await?;
        debug!(handle, entries = iter.len(), "listed multihashes for advertisement");
        Ok(iter)
    }
}
