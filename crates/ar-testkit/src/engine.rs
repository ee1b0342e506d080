//! Recording [`AnnouncementEngine`].
//!
//! Behaves like a real engine as far as the core can observe: it requires a
//! registered lister, pulls the entries for every `notify_put` through it,
//! and returns a distinct content-addressed id per advertisement. Failures
//! and latency are injectable per handle.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ar_announce::{
    AnnounceError, AnnouncementEngine, ContextId, Metadata, Multihash, MultihashLister,
};
use async_trait::async_trait;
use cid::Cid;
use libp2p::{Multiaddr, PeerId};

/// Multicodec for dag-json.
const DAG_JSON: u64 = 0x0129;
/// Multicodec for the identity hash.
const IDENTITY: u64 = 0x00;

type BeforeList = Arc<dyn Fn(&ContextId) + Send + Sync>;

/// One observed `notify_put`, with the entries the lister produced for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyPutCall {
    pub context_id: ContextId,
    pub provider: PeerId,
    pub addrs: Vec<Multiaddr>,
    pub metadata: Metadata,
    pub entries: Vec<Multihash>,
    pub advertisement: Cid,
}

#[derive(Default)]
struct Inner {
    lister: Option<Arc<dyn MultihashLister>>,
    calls: Vec<NotifyPutCall>,
    attempts: u32,
    failing_handles: HashSet<String>,
    fail_all: bool,
}

#[derive(Default)]
pub struct RecordingEngine {
    inner: Mutex<Inner>,
    delay: Option<Duration>,
    before_list: Option<BeforeList>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish returns a protocol error.
    pub fn failing() -> Self {
        let engine = Self::default();
        engine.lock().fail_all = true;
        engine
    }

    /// Publishes for `handle` return a protocol error.
    pub fn fail_for(self, handle: &str) -> Self {
        self.lock().failing_handles.insert(handle.to_string());
        self
    }

    /// Sleep this long inside every `notify_put`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Run `hook` between the publish request and the lister call.
    pub fn before_list(mut self, hook: impl Fn(&ContextId) + Send + Sync + 'static) -> Self {
        self.before_list = Some(Arc::new(hook));
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Successful publishes, in order.
    pub fn calls(&self) -> Vec<NotifyPutCall> {
        self.lock().calls.clone()
    }

    /// Every `notify_put`, including failed ones.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    pub fn has_lister(&self) -> bool {
        self.lock().lister.is_some()
    }
}

#[async_trait]
impl AnnouncementEngine for RecordingEngine {
    fn register_multihash_lister(&self, lister: Arc<dyn MultihashLister>) {
        self.lock().lister = Some(lister);
    }

    async fn notify_put(
        &self,
        context_id: &ContextId,
        provider: PeerId,
        addrs: &[Multiaddr],
        metadata: Metadata,
    ) -> Result<Cid, AnnounceError> {
        let lister = {
            let mut g = self.lock();
            g.attempts += 1;
            let handle = context_id.to_string();
            if g.fail_all || g.failing_handles.contains(&handle) {
                return Err(AnnounceError::protocol(format!("injected publish failure for {handle}")));
            }
            g.lister
                .clone()
                .ok_or_else(|| AnnounceError::protocol("no multihash lister registered"))?
        };

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(hook) = &self.before_list {
            hook(context_id);
        }

        let entries: Vec<Multihash> = lister.list(context_id).await?.collect();

        let mut g = self.lock();
        let seq = g.calls.len() as u64 + 1;
        let digest = Multihash::wrap(IDENTITY, &seq.to_be_bytes())
            .map_err(|e| AnnounceError::protocol(format!("advertisement id: {e}")))?;
        let advertisement = Cid::new_v1(DAG_JSON, digest);
        g.calls.push(NotifyPutCall {
            context_id: context_id.clone(),
            provider,
            addrs: addrs.to_vec(),
            metadata,
            entries,
            advertisement,
        });
        Ok(advertisement)
    }
}
