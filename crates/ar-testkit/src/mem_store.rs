//! In-memory [`AnnounceStore`] with failure injection and call counters.

use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{bail, Result};
use ar_announce::AnnounceStore;
use ar_schemas::{ContentRecord, FrontEndRegistration};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cid::Cid;

#[derive(Default)]
struct Inner {
    front_ends: Vec<FrontEndRegistration>,
    contents: Vec<ContentRecord>,
    next_content_id: i64,
    failing_listings: u32,
    fail_watermark_updates: bool,
    watermark_updates: Vec<(String, DateTime<Utc>)>,
    count_calls: u32,
    list_calls: u32,
}

#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace (by handle).
    pub fn put_front_end(&self, fe: FrontEndRegistration) {
        let mut g = self.lock();
        match g.front_ends.iter_mut().find(|x| x.handle == fe.handle) {
            Some(slot) => *slot = fe,
            None => g.front_ends.push(fe),
        }
    }

    pub fn front_end(&self, handle: &str) -> Option<FrontEndRegistration> {
        self.lock().front_ends.iter().find(|x| x.handle == handle).cloned()
    }

    pub fn front_ends(&self) -> Vec<FrontEndRegistration> {
        self.lock().front_ends.clone()
    }

    pub fn add_content(&self, cid: Cid, active: bool, created_at: DateTime<Utc>) -> ContentRecord {
        let mut g = self.lock();
        g.next_content_id += 1;
        let rec = ContentRecord {
            id: g.next_content_id,
            cid,
            active,
            created_at,
        };
        g.contents.push(rec.clone());
        rec
    }

    /// The next `n` front-end listings (heartbeat-filtered or not) fail.
    pub fn fail_next_listings(&self, n: u32) {
        self.lock().failing_listings = n;
    }

    pub fn fail_watermark_updates(&self, fail: bool) {
        self.lock().fail_watermark_updates = fail;
    }

    /// Every accepted `update_watermark` call, in order.
    pub fn watermark_updates(&self) -> Vec<(String, DateTime<Utc>)> {
        self.lock().watermark_updates.clone()
    }

    pub fn count_calls(&self) -> u32 {
        self.lock().count_calls
    }

    pub fn list_calls(&self) -> u32 {
        self.lock().list_calls
    }

    fn active_since(g: &Inner, since: DateTime<Utc>) -> impl Iterator<Item = &ContentRecord> {
        g.contents
            .iter()
            .filter(move |c| c.active && c.created_at >= since)
    }
}

#[async_trait]
impl AnnounceStore for MemStore {
    async fn list_front_ends(
        &self,
        last_connection_after: DateTime<Utc>,
    ) -> Result<Vec<FrontEndRegistration>> {
        let mut g = self.lock();
        if g.failing_listings > 0 {
            g.failing_listings -= 1;
            bail!("injected listing failure");
        }
        Ok(g.front_ends
            .iter()
            .filter(|fe| fe.last_connection > last_connection_after)
            .cloned()
            .collect())
    }

    async fn list_registrations(&self) -> Result<Vec<FrontEndRegistration>> {
        let mut g = self.lock();
        if g.failing_listings > 0 {
            g.failing_listings -= 1;
            bail!("injected listing failure");
        }
        Ok(g.front_ends.clone())
    }

    async fn get_front_end(&self, handle: &str) -> Result<Option<FrontEndRegistration>> {
        Ok(self.front_end(handle))
    }

    async fn count_active_content_since(&self, since: DateTime<Utc>) -> Result<i64> {
        let mut g = self.lock();
        g.count_calls += 1;
        Ok(Self::active_since(&g, since).count() as i64)
    }

    async fn list_active_content_since(&self, since: DateTime<Utc>) -> Result<Vec<ContentRecord>> {
        let mut g = self.lock();
        g.list_calls += 1;
        Ok(Self::active_since(&g, since).cloned().collect())
    }

    async fn update_watermark(&self, handle: &str, at: DateTime<Utc>) -> Result<()> {
        let mut g = self.lock();
        if g.fail_watermark_updates {
            bail!("injected watermark update failure");
        }
        g.watermark_updates.push((handle.to_string(), at));
        if let Some(fe) = g.front_ends.iter_mut().find(|x| x.handle == handle) {
            if at > fe.last_advertisement {
                fe.last_advertisement = at;
                fe.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}
