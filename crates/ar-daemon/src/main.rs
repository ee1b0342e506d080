//! ar-daemon entry point.
//!
//! Sets up tracing, loads config and secrets, connects the store, starts the
//! libp2p host and the reconciliation loop, then serves the HTTP API until
//! ctrl-c. Route handlers live in `routes.rs`; shared state in `state.rs`.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use ar_announce::{AnnouncementEngine, AnnounceStore, ContentLister, ReconciliationScheduler};
use ar_config::{
    load_layered_yaml, report_unused_keys, resolve_secrets, AutoretrieveConfig, UnusedKeyPolicy,
};
use ar_daemon::{routes, state, wiring};
use ar_db::PgStore;
use ar_provider::{load_identity, spawn_host, IndexProvider};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

/// How long background tasks get to wind down after the server stops.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "ar-daemon", about = "Autoretrieve announcement service")]
struct Args {
    /// YAML config layers, applied in order on top of the built-in defaults.
    #[arg(long = "config")]
    config: Vec<String>,

    /// Override `daemon.bind_addr`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let args = Args::parse();

    let paths: Vec<&str> = args.config.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths).context("config load failed")?;
    report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    let cfg = AutoretrieveConfig::from_loaded(&loaded)?;
    let secrets = resolve_secrets(&cfg)?;

    let host_config = wiring::build_host_config(&cfg)?;
    let sched_config = wiring::build_scheduler_config(&cfg);
    let bind = wiring::resolve_bind_addr(&cfg, args.bind.as_deref())?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let pool = ar_db::connect_from_env().await?;
    ar_db::migrate(&pool).await?;
    let store: Arc<dyn AnnounceStore> = Arc::new(PgStore::new(pool));

    let cancel = CancellationToken::new();

    let identity = load_identity(secrets.provider_identity_key.as_deref())?;
    let announce_addrs = host_config.listen.clone();
    let topic = host_config.topic.clone();
    let (host, keypair, host_join) = spawn_host(identity, host_config, cancel.child_token())?;

    let provider = Arc::new(IndexProvider::new(keypair, Arc::new(host), announce_addrs));
    provider.register_multihash_lister(Arc::new(ContentLister::new(Arc::clone(&store))));

    let scheduler = Arc::new(ReconciliationScheduler::new(
        Arc::clone(&store),
        provider.clone(),
        sched_config,
        cancel.child_token(),
    ));
    let scheduler_status = scheduler.subscribe();
    let scheduler_join = Arc::clone(&scheduler).spawn();

    let shared = Arc::new(state::AppState::new(
        store,
        scheduler_status.clone(),
        state::DaemonInfo {
            config_hash: loaded.config_hash.clone(),
            topic,
            provider_peer_id: Some(provider.peer_id().to_string()),
        },
        Some(provider),
    ));

    let heartbeat_join = state::spawn_heartbeat(
        shared.bus.clone(),
        cfg.daemon.heartbeat_interval(),
        cancel.child_token(),
    );
    let forwarder_join = state::spawn_tick_forwarder(shared.bus.clone(), scheduler_status);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(wiring::cors_localhost_only());

    info!("ar-daemon listening on http://{}", bind);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await
        .context("server crashed")?;

    cancel.cancel();
    drop(shared);
    drop(scheduler);
    let joined = tokio::time::timeout(SHUTDOWN_GRACE, async {
        let _ = scheduler_join.await;
        let _ = heartbeat_join.await;
        let _ = host_join.await;
        let _ = forwarder_join.await;
    })
    .await;
    if joined.is_err() {
        warn!("background tasks did not stop within {:?}", SHUTDOWN_GRACE);
    }
    info!("ar-daemon stopped");
    Ok(())
}

async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "ctrl-c handler failed, shutting down");
            }
            info!("shutdown requested");
        }
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
