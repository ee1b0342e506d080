//! [`IndexProvider`]: local announcement engine.
//!
//! Every `notify_put` pulls the entries for its context through the
//! registered lister, signs an advertisement linked to the current head and
//! gossips it. The head only moves once the gossip publish succeeded;
//! publishes are serialized so each advertisement links to the one before it.
//! Only the head advertisement is retained.

use std::sync::{Arc, RwLock};

use ar_announce::{
    AnnounceError, AnnouncementEngine, ContextId, Metadata, Multihash, MultihashLister,
};
use async_trait::async_trait;
use cid::Cid;
use libp2p::identity::Keypair;
use libp2p::{Multiaddr, PeerId};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::advertisement::{advertisement_cid, AnnounceMessage, Advertisement};

/// Where announce messages go. Implemented by [`crate::HostHandle`].
#[async_trait]
pub trait AnnounceSink: Send + Sync {
    async fn announce(&self, payload: Vec<u8>) -> Result<(), AnnounceError>;
}

#[derive(Default)]
struct Chain {
    head: Option<(Cid, Advertisement)>,
}

pub struct IndexProvider {
    keypair: Keypair,
    sink: Arc<dyn AnnounceSink>,
    /// Addresses advertised in announce messages (where the chain is served).
    announce_addrs: Vec<Multiaddr>,
    lister: RwLock<Option<Arc<dyn MultihashLister>>>,
    chain: Mutex<Chain>,
}

impl IndexProvider {
    pub fn new(keypair: Keypair, sink: Arc<dyn AnnounceSink>, announce_addrs: Vec<Multiaddr>) -> Self {
        Self {
            keypair,
            sink,
            announce_addrs,
            lister: RwLock::new(None),
            chain: Mutex::new(Chain::default()),
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.keypair.public().to_peer_id()
    }

    pub async fn head(&self) -> Option<Cid> {
        self.chain.lock().await.head.as_ref().map(|(id, _)| *id)
    }

    /// The most recently published advertisement and its id.
    pub async fn head_advertisement(&self) -> Option<(Cid, Advertisement)> {
        self.chain.lock().await.head.clone()
    }

    fn current_lister(&self) -> Option<Arc<dyn MultihashLister>> {
        match self.lister.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl AnnouncementEngine for IndexProvider {
    fn register_multihash_lister(&self, lister: Arc<dyn MultihashLister>) {
        let mut slot = match self.lister.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(lister);
    }

    async fn notify_put(
        &self,
        context_id: &ContextId,
        provider: PeerId,
        addrs: &[Multiaddr],
        metadata: Metadata,
    ) -> Result<Cid, AnnounceError> {
        let lister = self
            .current_lister()
            .ok_or_else(|| AnnounceError::protocol("no multihash lister registered"))?;

        let entries: Vec<Multihash> = lister.list(context_id).await?.collect();
        if entries.is_empty() {
            return Err(AnnounceError::protocol(format!(
                "lister returned no entries for context {context_id}"
            )));
        }

        let mut chain = self.chain.lock().await;
        let ad = Advertisement::signed(
            &self.keypair,
            chain.head.as_ref().map(|(id, _)| id),
            context_id,
            provider,
            addrs,
            metadata,
            &entries,
        )?;
        let id = advertisement_cid(&ad.to_bytes()?)?;
        debug!(context = %context_id, advertisement = %id, entries = entries.len(), "built advertisement");

        let msg = AnnounceMessage::new(&id, &self.announce_addrs).to_bytes()?;
        self.sink.announce(msg).await?;

        chain.head = Some((id, ad));
        info!(context = %context_id, advertisement = %id, "published advertisement");
        Ok(id)
    }
}
