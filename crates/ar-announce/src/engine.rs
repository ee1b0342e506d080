//! Announcement engine boundary.
//!
//! The engine serializes, signs and publishes advertisements. It is handed a
//! [`MultihashLister`] once at startup and calls it lazily, possibly much
//! later than the `notify_put` that triggered it, whenever it needs the entry
//! list for a context.

use std::sync::Arc;

use async_trait::async_trait;
use cid::Cid;
use libp2p::{Multiaddr, PeerId};

use crate::context::ContextId;
use crate::delta::MultihashIter;
use crate::error::AnnounceError;

/// Multicodec transport id for Bitswap retrieval (`transport-bitswap`).
pub const TRANSPORT_BITSWAP: u64 = 0x0900;

/// Content-serving metadata attached to an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metadata {
    /// Retrievable over Bitswap. Carries no protocol parameters.
    Bitswap,
}

impl Metadata {
    pub fn transport_id(&self) -> u64 {
        match self {
            Metadata::Bitswap => TRANSPORT_BITSWAP,
        }
    }

    /// Wire form: unsigned varint of the transport id, no payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2);
        let mut v = self.transport_id();
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
        out
    }
}

/// Enumerates the multihashes for one context, on demand.
#[async_trait]
pub trait MultihashLister: Send + Sync {
    async fn list(&self, context_id: &ContextId) -> Result<MultihashIter, AnnounceError>;
}

#[async_trait]
pub trait AnnouncementEngine: Send + Sync {
    /// Install the lister. Called once, before the first `notify_put`.
    fn register_multihash_lister(&self, lister: Arc<dyn MultihashLister>);

    /// Publish an advertisement and return its content-addressed id.
    async fn notify_put(
        &self,
        context_id: &ContextId,
        provider: PeerId,
        addrs: &[Multiaddr],
        metadata: Metadata,
    ) -> Result<Cid, AnnounceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitswap_metadata_is_varint_0x0900() {
        assert_eq!(Metadata::Bitswap.to_bytes(), vec![0x80, 0x12]);
    }
}
