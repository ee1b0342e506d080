//! Deterministic keys, addresses, CIDs and front-end records.
//!
//! Test-only helpers: they panic on inputs that cannot occur with fixed seeds.

use ar_schemas::FrontEndRegistration;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use cid::multihash::Multihash;
use cid::Cid;
use libp2p::identity::Keypair;
use sha2::{Digest, Sha256};

const RAW: u64 = 0x55;
const SHA2_256: u64 = 0x12;

/// Ed25519 keypair from a fixed seed. Same seed, same peer id.
pub fn keypair(seed: u8) -> Keypair {
    Keypair::ed25519_from_bytes([seed; 32]).expect("32-byte ed25519 seed")
}

/// Base64 protobuf encoding, as stored in `private_key`.
pub fn encoded_key(kp: &Keypair) -> String {
    STANDARD.encode(kp.to_protobuf_encoding().expect("ed25519 key encodes"))
}

/// `<transport>/p2p/<peer id of kp>`.
pub fn peer_addr(kp: &Keypair, transport: &str) -> String {
    format!("{transport}/p2p/{}", kp.public().to_peer_id())
}

/// CIDv1 raw over sha2-256 of `seed`.
pub fn cid_for(seed: &str) -> Cid {
    let digest = Sha256::digest(seed.as_bytes());
    let mh = Multihash::<64>::wrap(SHA2_256, &digest).expect("sha2-256 digest fits");
    Cid::new_v1(RAW, mh)
}

/// Builder for [`FrontEndRegistration`]. Defaults: online now, watermark one
/// hour ago, no addresses.
pub struct FrontEndBuilder {
    fe: FrontEndRegistration,
}

impl FrontEndBuilder {
    pub fn new(handle: &str) -> Self {
        let now = Utc::now();
        Self {
            fe: FrontEndRegistration {
                id: 0,
                handle: handle.to_string(),
                token: format!("SECRET-{handle}"),
                private_key: String::new(),
                addresses: String::new(),
                last_connection: now,
                last_advertisement: now - chrono::Duration::hours(1),
                created_at: now,
                updated_at: now,
            },
        }
    }

    /// Key + one address per transport, all naming the key's peer.
    pub fn identity(mut self, kp: &Keypair, transports: &[&str]) -> Self {
        self.fe.private_key = encoded_key(kp);
        self.fe.addresses = transports
            .iter()
            .map(|t| peer_addr(kp, t))
            .collect::<Vec<_>>()
            .join(",");
        self
    }

    pub fn addresses(mut self, addresses: &str) -> Self {
        self.fe.addresses = addresses.to_string();
        self
    }

    pub fn last_connection(mut self, at: DateTime<Utc>) -> Self {
        self.fe.last_connection = at;
        self
    }

    pub fn last_advertisement(mut self, at: DateTime<Utc>) -> Self {
        self.fe.last_advertisement = at;
        self
    }

    pub fn build(self) -> FrontEndRegistration {
        self.fe
    }
}
