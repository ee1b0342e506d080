//! Advertisement and announce message wire types.
//!
//! An advertisement is serialized as JSON and addressed by a CIDv1 with the
//! dag-json codec over a sha2-256 multihash of those bytes. Binary fields
//! (context id, metadata, multihashes, signature) are base64 (standard
//! alphabet, padded).

use ar_announce::{AnnounceError, ContextId, Metadata, Multihash};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cid::Cid;
use libp2p::identity::{Keypair, PublicKey};
use libp2p::{Multiaddr, PeerId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const DAG_JSON: u64 = 0x0129;
pub const SHA2_256: u64 = 0x12;

/// Domain separator mixed into every signature payload.
const SIGNATURE_DOMAIN: &[u8] = b"/indexer/ingest/adSignature";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Advertisement {
    /// CID of the previous head, `None` for the first advertisement.
    pub previous_id: Option<String>,
    pub provider: String,
    pub addresses: Vec<String>,
    pub entries: Vec<String>,
    pub context_id: String,
    pub metadata: String,
    pub is_rm: bool,
    /// Base64 of the signer's protobuf public key.
    pub signer: String,
    pub signature: String,
}

impl Advertisement {
    /// Build and sign an advertisement.
    pub fn signed(
        keypair: &Keypair,
        previous: Option<&Cid>,
        context_id: &ContextId,
        provider: PeerId,
        addrs: &[Multiaddr],
        metadata: Metadata,
        entries: &[Multihash],
    ) -> Result<Self, AnnounceError> {
        let mut ad = Advertisement {
            previous_id: previous.map(|c| c.to_string()),
            provider: provider.to_string(),
            addresses: addrs.iter().map(|a| a.to_string()).collect(),
            entries: entries.iter().map(|mh| STANDARD.encode(mh.to_bytes())).collect(),
            context_id: STANDARD.encode(context_id.as_bytes()),
            metadata: STANDARD.encode(metadata.to_bytes()),
            is_rm: false,
            signer: STANDARD.encode(keypair.public().encode_protobuf()),
            signature: String::new(),
        };
        let sig = keypair
            .sign(&ad.signing_payload()?)
            .map_err(|e| AnnounceError::protocol(format!("signing advertisement: {e}")))?;
        ad.signature = STANDARD.encode(sig);
        Ok(ad)
    }

    /// sha256 of the domain tag followed by the canonical JSON encoding of
    /// the advertisement with `signature` blanked. JSON framing keeps field
    /// boundaries, so bytes cannot migrate from one field into the next.
    pub fn signing_payload(&self) -> Result<Vec<u8>, AnnounceError> {
        let unsigned = Advertisement {
            signature: String::new(),
            ..self.clone()
        };
        let body = serde_json::to_vec(&unsigned)
            .map_err(|e| AnnounceError::protocol(format!("encoding advertisement: {e}")))?;
        let mut h = Sha256::new();
        h.update(SIGNATURE_DOMAIN);
        h.update(&body);
        Ok(h.finalize().to_vec())
    }

    /// Check the signature against the embedded signer key.
    pub fn verify(&self) -> bool {
        let Ok(key_bytes) = STANDARD.decode(&self.signer) else {
            return false;
        };
        let Ok(key) = PublicKey::try_decode_protobuf(&key_bytes) else {
            return false;
        };
        let Ok(sig) = STANDARD.decode(&self.signature) else {
            return false;
        };
        let Ok(payload) = self.signing_payload() else {
            return false;
        };
        key.verify(&payload, &sig)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AnnounceError> {
        serde_json::to_vec(self).map_err(|e| AnnounceError::protocol(format!("encoding advertisement: {e}")))
    }
}

/// Content address of serialized advertisement bytes.
pub fn advertisement_cid(bytes: &[u8]) -> Result<Cid, AnnounceError> {
    let digest = Sha256::digest(bytes);
    let mh = Multihash::wrap(SHA2_256, &digest)
        .map_err(|e| AnnounceError::protocol(format!("advertisement multihash: {e}")))?;
    Ok(Cid::new_v1(DAG_JSON, mh))
}

/// Gossip payload telling indexers where the new chain head can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceMessage {
    #[serde(rename = "Cid")]
    pub cid: String,
    #[serde(rename = "Addrs")]
    pub addrs: Vec<String>,
}

impl AnnounceMessage {
    pub fn new(cid: &Cid, addrs: &[Multiaddr]) -> Self {
        Self {
            cid: cid.to_string(),
            addrs: addrs.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, AnnounceError> {
        serde_json::to_vec(self).map_err(|e| AnnounceError::protocol(format!("encoding announce message: {e}")))
    }
}
