//! Front-end address record validation.
//!
//! A front-end declares itself with a base64 libp2p private key and a list of
//! `/…/p2p/<peer id>` multiaddresses. [`validate_peer_info`] is the full check
//! used when a record is accepted; [`parse_addr_info`] is the per-entry parse
//! the announcement driver reuses on every tick.
//!
//! # First-address-wins
//!
//! Identity is resolved from the FIRST address only. Later entries must be
//! well-formed but are not required to name the same peer, and the peer id
//! derived from the private key is not required to match either (a mismatch
//! is logged). Both are known ambiguities kept as-is.

use ar_schemas::AddrInfoView;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use libp2p::{identity::Keypair, multiaddr::Protocol, Multiaddr, PeerId};
use tracing::warn;

use crate::error::ValidationError;

/// Peer identity plus the transport addresses it is reachable on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrInfo {
    pub id: PeerId,
    pub addrs: Vec<Multiaddr>,
}

impl AddrInfo {
    pub fn to_view(&self) -> AddrInfoView {
        AddrInfoView {
            id: self.id.to_string(),
            addrs: multiaddrs_to_string(&self.addrs),
        }
    }
}

/// Decode a base64 protobuf-encoded private key.
pub fn string_to_priv_key(encoded: &str) -> Result<Keypair, ValidationError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ValidationError::InvalidKeyEncoding(e.to_string()))?;
    Keypair::from_protobuf_encoding(&bytes)
        .map_err(|e| ValidationError::InvalidKeyMaterial(e.to_string()))
}

/// Parse one multiaddress. Blank input is rejected.
pub fn parse_multiaddr(addr: &str) -> Result<Multiaddr, ValidationError> {
    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MalformedAddress {
            addr: addr.to_string(),
            reason: "empty multiaddr".to_string(),
        });
    }
    trimmed
        .parse::<Multiaddr>()
        .map_err(|e| ValidationError::MalformedAddress {
            addr: addr.to_string(),
            reason: e.to_string(),
        })
}

/// Every entry that is not a well-formed multiaddress, input order kept.
pub fn validate_addresses(addresses: &[&str]) -> Vec<String> {
    addresses
        .iter()
        .filter(|a| parse_multiaddr(a).is_err())
        .map(|a| a.to_string())
        .collect()
}

/// Split `/transport…/p2p/<id>` into peer id + transport address.
///
/// A bare `/p2p/<id>` yields an `AddrInfo` with no addresses.
pub fn parse_addr_info(addr: &str) -> Result<AddrInfo, ValidationError> {
    let mut ma = parse_multiaddr(addr)?;
    match ma.pop() {
        Some(Protocol::P2p(id)) => Ok(AddrInfo {
            id,
            addrs: if ma.is_empty() { Vec::new() } else { vec![ma] },
        }),
        _ => Err(ValidationError::MissingPeerId(addr.to_string())),
    }
}

/// Validate a declared identity + address list.
pub fn validate_peer_info(private_key: &str, addresses: &[&str]) -> Result<AddrInfo, ValidationError> {
    let keypair = string_to_priv_key(private_key)?;
    let key_peer_id = keypair.public().to_peer_id();

    match addresses.first() {
        None => return Err(ValidationError::NoAddressesProvided),
        Some(first) if first.trim().is_empty() => return Err(ValidationError::NoAddressesProvided),
        Some(_) => {}
    }

    let invalid = validate_addresses(addresses);
    if !invalid.is_empty() {
        return Err(ValidationError::InvalidAddresses(invalid));
    }

    let info = parse_addr_info(addresses[0])?;
    if info.id != key_peer_id {
        warn!(
            key_peer_id = %key_peer_id,
            addr_peer_id = %info.id,
            "address record names a different peer than its private key"
        );
    }
    Ok(info)
}

/// Parse a comma-joined address string, failing on the first bad entry.
pub fn string_to_multiaddrs(addr_str: &str) -> Result<Vec<Multiaddr>, ValidationError> {
    addr_str.split(',').map(parse_multiaddr).collect()
}

pub fn multiaddrs_to_string(addrs: &[Multiaddr]) -> Vec<String> {
    addrs.iter().map(|a| a.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> Keypair {
        Keypair::ed25519_from_bytes([seed; 32]).unwrap()
    }

    fn encoded_key(kp: &Keypair) -> String {
        STANDARD.encode(kp.to_protobuf_encoding().unwrap())
    }

    fn addr_for(kp: &Keypair, transport: &str) -> String {
        format!("{transport}/p2p/{}", kp.public().to_peer_id())
    }

    #[test]
    fn valid_record_resolves_first_address() {
        let kp = keypair(7);
        let a1 = addr_for(&kp, "/ip4/1.2.3.4/tcp/4001");
        let a2 = addr_for(&kp, "/ip4/5.6.7.8/udp/4001/quic-v1");
        let info = validate_peer_info(&encoded_key(&kp), &[&a1, &a2]).unwrap();

        assert_eq!(info.id, kp.public().to_peer_id());
        assert_eq!(info.addrs.len(), 1);
        assert_eq!(info.addrs[0].to_string(), "/ip4/1.2.3.4/tcp/4001");
    }

    #[test]
    fn later_address_may_name_another_peer() {
        let kp = keypair(7);
        let other = keypair(8);
        let a1 = addr_for(&kp, "/ip4/1.2.3.4/tcp/4001");
        let a2 = addr_for(&other, "/ip4/5.6.7.8/tcp/4001");
        let info = validate_peer_info(&encoded_key(&kp), &[&a1, &a2]).unwrap();
        assert_eq!(info.id, kp.public().to_peer_id());
    }

    #[test]
    fn bad_base64_is_invalid_key_encoding() {
        let err = validate_peer_info("not base64 !!", &["/ip4/1.2.3.4/tcp/1"]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidKeyEncoding(_)));
    }

    #[test]
    fn undecodable_key_bytes_are_invalid_key_material() {
        let garbage = STANDARD.encode([1u8, 2, 3, 4]);
        let err = validate_peer_info(&garbage, &["/ip4/1.2.3.4/tcp/1"]).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidKeyMaterial(_)));
    }

    #[test]
    fn empty_or_blank_first_address_is_no_addresses() {
        let key = encoded_key(&keypair(1));
        assert_eq!(
            validate_peer_info(&key, &[]).unwrap_err(),
            ValidationError::NoAddressesProvided
        );
        assert_eq!(
            validate_peer_info(&key, &["  "]).unwrap_err(),
            ValidationError::NoAddressesProvided
        );
    }

    #[test]
    fn every_malformed_address_is_reported_in_order() {
        let kp = keypair(2);
        let good = addr_for(&kp, "/ip4/1.2.3.4/tcp/4001");
        let err = validate_peer_info(
            &encoded_key(&kp),
            &[&good, "/ip4/999.1.1.1/tcp/1", "garbage", "/tcp/notaport"],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidAddresses(vec![
                "/ip4/999.1.1.1/tcp/1".to_string(),
                "garbage".to_string(),
                "/tcp/notaport".to_string(),
            ])
        );
    }

    #[test]
    fn well_formed_first_address_without_peer_id_fails() {
        let kp = keypair(3);
        let err = validate_peer_info(&encoded_key(&kp), &["/ip4/1.2.3.4/tcp/4001"]).unwrap_err();
        assert!(matches!(err, ValidationError::MissingPeerId(_)));
    }

    #[test]
    fn bare_p2p_address_has_no_transport() {
        let kp = keypair(4);
        let info = parse_addr_info(&format!("/p2p/{}", kp.public().to_peer_id())).unwrap();
        assert!(info.addrs.is_empty());
    }

    #[test]
    fn string_to_multiaddrs_round_trips() {
        let addrs = string_to_multiaddrs("/ip4/1.2.3.4/tcp/1,/dns4/example.com/tcp/443").unwrap();
        assert_eq!(
            multiaddrs_to_string(&addrs),
            vec!["/ip4/1.2.3.4/tcp/1", "/dns4/example.com/tcp/443"]
        );
        assert!(string_to_multiaddrs("/ip4/1.2.3.4/tcp/1,nope").is_err());
    }
}
