//! Error taxonomy for the announcement core.
//!
//! | variant         | scope          | effect                                   |
//! |-----------------|----------------|------------------------------------------|
//! | `Configuration` | startup        | fatal, process does not start            |
//! | `Validation`    | one front-end  | skipped for the current tick             |
//! | `Store`         | tick or record | listing: tick skipped; per-record: front-end skipped |
//! | `Protocol`      | one front-end  | watermark not advanced, retried next tick |
//! | `Timeout`       | one front-end  | treated like `Protocol`                  |

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unable to decode private key: {0}")]
    InvalidKeyEncoding(String),

    #[error("invalid peer information: {0}")]
    InvalidKeyMaterial(String),

    #[error("no addresses provided")]
    NoAddressesProvided,

    /// Every malformed entry, in input order.
    #[error("invalid address(es): {}", .0.join(", "))]
    InvalidAddresses(Vec<String>),

    #[error("could not parse multiaddress '{addr}': {reason}")]
    MalformedAddress { addr: String, reason: String },

    #[error("multiaddress '{0}' has no trailing /p2p/<peer id>")]
    MissingPeerId(String),

    #[error("multiaddress '{0}' has no transport address before /p2p")]
    MissingTransport(String),

    #[error("no provider id could be resolved from the address record")]
    NoProviderId,

    #[error("no retrieval addresses could be resolved from the address record")]
    NoRetrievalAddresses,
}

#[derive(Debug, Error)]
pub enum AnnounceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store error: {0:#}")]
    Store(anyhow::Error),

    #[error("announcement protocol error: {0}")]
    Protocol(String),

    #[error("no front-end registered for context id '{0}'")]
    UnknownContext(String),

    #[error("front-end '{handle}' did not finish within {timeout:?}")]
    Timeout { handle: String, timeout: Duration },
}

impl AnnounceError {
    pub fn store(err: anyhow::Error) -> Self {
        AnnounceError::Store(err)
    }

    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        AnnounceError::Protocol(msg.to_string())
    }

    /// Validation failures mean "bad record, skip"; everything else is a
    /// failed attempt worth an error-level log.
    pub fn is_validation(&self) -> bool {
        matches!(self, AnnounceError::Validation(_))
    }
}
