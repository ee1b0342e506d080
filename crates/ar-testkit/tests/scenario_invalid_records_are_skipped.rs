//! Scenario: unusable or offline front-ends never reach the engine.
//!
//! # Invariants under test
//!
//! 1. An empty address record is skipped: no publish, watermark unchanged.
//! 2. A record where every entry is malformed is skipped the same way.
//! 3. Malformed entries next to a good one are dropped; the good one is used.
//! 4. Front-ends whose last heartbeat is older than one interval are not listed.
//! 5. The validator accepts a well-formed record and names every malformed
//!    entry, in order, for a bad one.

use std::sync::Arc;

use ar_announce::{
    validate_peer_info, AnnouncementEngine, ContentLister, ReconciliationScheduler,
    SchedulerConfig, ValidationError,
};
use ar_testkit::{cid_for, encoded_key, keypair, peer_addr, FrontEndBuilder, MemStore, RecordingEngine};
use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

fn setup() -> (Arc<MemStore>, Arc<RecordingEngine>, ReconciliationScheduler) {
    let store = Arc::new(MemStore::new());
    let engine = Arc::new(RecordingEngine::new());
    engine.register_multihash_lister(Arc::new(ContentLister::new(store.clone())));
    let sched = ReconciliationScheduler::new(
        store.clone(),
        engine.clone(),
        SchedulerConfig::default(),
        CancellationToken::new(),
    );
    (store, engine, sched)
}

#[tokio::test]
async fn empty_address_record_is_skipped() {
    let (store, engine, sched) = setup();
    let watermark = Utc::now() - Duration::minutes(5);
    store.put_front_end(
        FrontEndBuilder::new("fe1")
            .addresses("")
            .last_advertisement(watermark)
            .build(),
    );
    store.add_content(cid_for("c1"), true, Utc::now());

    let report = sched.run_tick().await;
    assert_eq!(report.online, 1);
    assert_eq!(report.skipped_invalid, 1);
    assert_eq!(engine.attempts(), 0);
    assert_eq!(store.front_end("fe1").unwrap().last_advertisement, watermark);
}

#[tokio::test]
async fn all_malformed_record_is_skipped() {
    let (store, engine, sched) = setup();
    store.put_front_end(
        FrontEndBuilder::new("fe1")
            .addresses("garbage,/ip4/999.0.0.1/tcp/1,/ip4/1.2.3.4/tcp/4001")
            .build(),
    );
    store.add_content(cid_for("c1"), true, Utc::now());

    let report = sched.run_tick().await;
    assert_eq!(report.skipped_invalid, 1);
    assert_eq!(engine.attempts(), 0);
    assert!(store.watermark_updates().is_empty());
}

#[tokio::test]
async fn good_entry_survives_malformed_neighbours() {
    let (store, engine, sched) = setup();
    let kp = keypair(9);
    let good = peer_addr(&kp, "/ip4/10.0.0.9/tcp/4001");
    store.put_front_end(
        FrontEndBuilder::new("fe1")
            .addresses(&format!("garbage, {good}"))
            .build(),
    );
    store.add_content(cid_for("c1"), true, Utc::now());

    let report = sched.run_tick().await;
    assert_eq!(report.announced, 1);
    let calls = engine.calls();
    assert_eq!(calls[0].provider, kp.public().to_peer_id());
    assert_eq!(calls[0].addrs[0].to_string(), "/ip4/10.0.0.9/tcp/4001");
}

#[tokio::test]
async fn stale_heartbeat_is_not_online() {
    let (store, engine, sched) = setup();
    store.put_front_end(
        FrontEndBuilder::new("fe1")
            .identity(&keypair(1), &["/ip4/10.0.0.1/tcp/4001"])
            .last_connection(Utc::now() - Duration::minutes(2))
            .build(),
    );
    store.add_content(cid_for("c1"), true, Utc::now());

    let report = sched.run_tick().await;
    assert_eq!(report.online, 0);
    assert_eq!(engine.attempts(), 0);
}

#[test]
fn validator_accepts_record_and_reports_every_bad_entry() {
    let kp = keypair(6);
    let key = encoded_key(&kp);
    let a1 = peer_addr(&kp, "/ip4/1.2.3.4/tcp/4001");
    let a2 = peer_addr(&kp, "/ip6/::1/tcp/4001");

    let info = validate_peer_info(&key, &[&a1, &a2]).unwrap();
    assert_eq!(info.id, kp.public().to_peer_id());
    assert!(!info.addrs.is_empty());

    let err = validate_peer_info(&key, &["nope", "/ip4/1.2.3.4/tcp/x", "also-nope"]).unwrap_err();
    assert_eq!(
        err,
        ValidationError::InvalidAddresses(vec![
            "nope".to_string(),
            "/ip4/1.2.3.4/tcp/x".to_string(),
            "also-nope".to_string(),
        ])
    );
}
