//! ar-provider
//!
//! Local index-provider side of the announcement protocol:
//! - [`host`]: libp2p swarm joined to the indexer ingest gossip topic.
//! - [`engine`]: [`IndexProvider`], an [`ar_announce::AnnouncementEngine`]
//!   that builds a signed advertisement chain and gossips each new head.

pub mod advertisement;
pub mod engine;
pub mod host;

pub use advertisement::{advertisement_cid, AnnounceMessage, Advertisement};
pub use engine::{AnnounceSink, IndexProvider};
pub use host::{load_identity, spawn_host, HostConfig, HostHandle};
