//! Test doubles and fixtures for the announcement core.
//!
//! Everything here is in-process and deterministic apart from wall-clock
//! timestamps. The scenario tests under `tests/` drive the real scheduler and
//! driver against these doubles.

pub mod engine;
pub mod fixtures;
pub mod mem_store;

pub use engine::{NotifyPutCall, RecordingEngine};
pub use fixtures::{cid_for, encoded_key, keypair, peer_addr, FrontEndBuilder};
pub use mem_store::MemStore;
