//! Typed announcement context identifier.
//!
//! The engine correlates an advertisement with the lister that enumerates it
//! through an opaque byte string. Here that byte string is always the UTF-8
//! encoding of a front-end handle, so the chain
//! `ContextId ⇄ handle ⇄ store lookup key` is lossless for every handle.

use std::fmt;

use crate::error::AnnounceError;

#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Vec<u8>);

impl ContextId {
    /// Encode a front-end handle (raw UTF-8 bytes, no framing).
    pub fn from_handle(handle: &str) -> Self {
        ContextId(handle.as_bytes().to_vec())
    }

    /// Wrap bytes received back from the engine.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        ContextId(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Decode back to the handle. Fails for bytes this crate never produced.
    pub fn to_handle(&self) -> Result<&str, AnnounceError> {
        std::str::from_utf8(&self.0)
            .map_err(|_| AnnounceError::UnknownContext(format!("0x{}", hex::encode(&self.0))))
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => f.write_str(s),
            Err(_) => write!(f, "0x{}", hex::encode(&self.0)),
        }
    }
}

impl fmt::Debug for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_round_trips_through_raw_bytes() {
        let id = ContextId::from_handle("fe1");
        assert_eq!(id.as_bytes(), b"fe1");
        assert_eq!(id.to_handle().unwrap(), "fe1");
    }

    #[test]
    fn non_utf8_bytes_are_unknown_context() {
        let id = ContextId::from_bytes(vec![0xff, 0x00]);
        let err = id.to_handle().unwrap_err();
        assert!(matches!(err, AnnounceError::UnknownContext(ref s) if s == "0xff00"));
        assert_eq!(id.to_string(), "0xff00");
    }
}
