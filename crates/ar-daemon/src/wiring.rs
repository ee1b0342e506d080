//! Typed config to runtime component settings.
//!
//! Every multiaddr in the config is parsed here, before anything starts, so a
//! bad address stops the daemon at boot instead of on the first tick.

use std::net::SocketAddr;

use ar_announce::{parse_multiaddr, AnnounceError, SchedulerConfig};
use ar_config::AutoretrieveConfig;
use ar_provider::HostConfig;
use axum::http::{HeaderValue, Method};
use libp2p::Multiaddr;
use tower_http::cors::{Any, CorsLayer};

fn config_addr(pointer: &str, raw: &str) -> Result<Multiaddr, AnnounceError> {
    parse_multiaddr(raw).map_err(|e| AnnounceError::Configuration(format!("{pointer}: {e}")))
}

pub fn build_host_config(cfg: &AutoretrieveConfig) -> Result<HostConfig, AnnounceError> {
    let indexer = config_addr("/provider/indexer_multiaddr", &cfg.provider.indexer_multiaddr)?;
    let listen = cfg
        .provider
        .listen_multiaddrs
        .iter()
        .enumerate()
        .map(|(i, raw)| config_addr(&format!("/provider/listen_multiaddrs/{i}"), raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(HostConfig {
        topic: cfg.provider.topic.clone(),
        indexer,
        listen,
        idle_connection_timeout: cfg.provider.idle_connection_timeout(),
    })
}

pub fn build_scheduler_config(cfg: &AutoretrieveConfig) -> SchedulerConfig {
    SchedulerConfig {
        tick_interval: cfg.announce.tick_interval(),
        publish_timeout: cfg.announce.publish_timeout(),
        max_concurrency: cfg.announce.max_concurrency,
    }
}

/// `--bind` wins over the config file.
pub fn resolve_bind_addr(
    cfg: &AutoretrieveConfig,
    cli_override: Option<&str>,
) -> Result<SocketAddr, AnnounceError> {
    let raw = cli_override.unwrap_or(&cfg.daemon.bind_addr);
    raw.parse()
        .map_err(|e| AnnounceError::Configuration(format!("bind address '{raw}': {e}")))
}

/// CORS: allow only localhost origins, read-only.
pub fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = ["http://localhost", "http://127.0.0.1"];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar_config::{load_layered_yaml_from_strings, DEFAULT_YAML};
    use std::time::Duration;

    fn cfg(overlay: &str) -> AutoretrieveConfig {
        let loaded = load_layered_yaml_from_strings(&[DEFAULT_YAML, overlay]).unwrap();
        AutoretrieveConfig::from_loaded(&loaded).unwrap()
    }

    #[test]
    fn defaults_map_onto_runtime_settings() {
        let c = cfg("");
        let host = build_host_config(&c).unwrap();
        assert_eq!(host.topic, "/indexer/ingest/mainnet");
        assert_eq!(host.listen.len(), 1);
        assert_eq!(host.idle_connection_timeout, Duration::from_secs(300));

        let sched = build_scheduler_config(&c);
        assert_eq!(sched.tick_interval, Duration::from_secs(60));
        assert_eq!(sched.publish_timeout, Duration::from_secs(30));
        assert_eq!(sched.max_concurrency, 1);
    }

    #[test]
    fn bad_listen_address_is_a_configuration_error() {
        let c = cfg("provider:\n  listen_multiaddrs: [\"/ip4/0.0.0.0/tcp/0\", \"not-an-addr\"]\n");
        let err = build_host_config(&c).unwrap_err();
        match err {
            AnnounceError::Configuration(msg) => {
                assert!(msg.contains("/provider/listen_multiaddrs/1"), "{msg}");
            }
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn cli_bind_overrides_config() {
        let c = cfg("");
        assert_eq!(
            resolve_bind_addr(&c, None).unwrap(),
            "127.0.0.1:8899".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            resolve_bind_addr(&c, Some("0.0.0.0:9000")).unwrap().port(),
            9000
        );
        assert!(resolve_bind_addr(&c, Some("nope")).is_err());
    }
}
