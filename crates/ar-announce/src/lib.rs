//! ar-announce
//!
//! Reconciliation core of the autoretrieve announcement service.
//!
//! On a fixed cadence the [`ReconciliationScheduler`] lists online front-ends,
//! and for each one the [`AnnouncementDriver`] resolves its provider identity,
//! checks the [`ContentDelta`] since its watermark, publishes an advertisement
//! through an [`AnnouncementEngine`] and advances the watermark. The engine
//! pulls the advertisement entries back through [`ContentLister`].
//!
//! IO lives behind two seams: [`AnnounceStore`] and [`AnnouncementEngine`].

pub mod addr;
pub mod context;
pub mod delta;
pub mod driver;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod store;

pub use addr::{
    multiaddrs_to_string, parse_addr_info, parse_multiaddr, string_to_multiaddrs,
    string_to_priv_key, validate_addresses, validate_peer_info, AddrInfo,
};
pub use context::ContextId;
pub use delta::{ContentDelta, ContentLister, Multihash, MultihashIter};
pub use driver::{resolve_retrieval_target, AnnouncementDriver, Outcome, RetrievalTarget};
pub use engine::{AnnouncementEngine, Metadata, MultihashLister, TRANSPORT_BITSWAP};
pub use error::{AnnounceError, ValidationError};
pub use scheduler::{
    ReconciliationScheduler, SchedulerConfig, SchedulerPhase, SchedulerStatus, TickReport,
};
pub use store::AnnounceStore;
