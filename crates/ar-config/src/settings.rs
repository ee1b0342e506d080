//! Typed view over a [`LoadedConfig`](crate::LoadedConfig).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::LoadedConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoretrieveConfig {
    pub announce: AnnounceSettings,
    pub provider: ProviderSettings,
    pub daemon: DaemonSettings,
}

/// Reconciliation loop cadence and per-front-end bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnounceSettings {
    /// Tick period. Also the heartbeat window that defines "online".
    pub tick_interval_secs: u64,
    /// Upper bound on one front-end's delta check + publish + watermark update.
    pub publish_timeout_secs: u64,
    /// Front-ends processed concurrently within one tick. 1 = store order.
    pub max_concurrency: usize,
}

impl AnnounceSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Gossipsub topic announcements are published on.
    pub topic: String,
    /// Indexer peer pinned as a direct gossipsub peer. Must carry `/p2p/<id>`.
    pub indexer_multiaddr: String,
    pub listen_multiaddrs: Vec<String>,
    /// NAME of the env var holding the host's base64 private key. Empty means
    /// the host runs with an ephemeral identity.
    pub identity_key_env: String,
    pub idle_connection_timeout_secs: u64,
}

impl ProviderSettings {
    pub fn idle_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_connection_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSettings {
    pub bind_addr: String,
    pub heartbeat_interval_secs: u64,
}

impl DaemonSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl AutoretrieveConfig {
    /// Decode and validate the merged config JSON.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        let cfg: AutoretrieveConfig = serde_json::from_value(loaded.config_json.clone())
            .context("config does not match the autoretrieve schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.announce.tick_interval_secs == 0 {
            bail!("CONFIG_INVALID /announce/tick_interval_secs must be > 0");
        }
        if self.announce.publish_timeout_secs == 0 {
            bail!("CONFIG_INVALID /announce/publish_timeout_secs must be > 0");
        }
        if self.announce.max_concurrency == 0 {
            bail!("CONFIG_INVALID /announce/max_concurrency must be >= 1");
        }
        if self.provider.topic.trim().is_empty() {
            bail!("CONFIG_INVALID /provider/topic must not be empty");
        }
        if !self.provider.indexer_multiaddr.contains("/p2p/") {
            bail!("CONFIG_INVALID /provider/indexer_multiaddr must end in /p2p/<peer id>");
        }
        if self.provider.listen_multiaddrs.is_empty() {
            bail!("CONFIG_INVALID /provider/listen_multiaddrs must not be empty");
        }
        if self.daemon.heartbeat_interval_secs == 0 {
            bail!("CONFIG_INVALID /daemon/heartbeat_interval_secs must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{load_layered_yaml_from_strings, DEFAULT_YAML};

    fn load(overlay: &str) -> Result<AutoretrieveConfig> {
        let loaded = load_layered_yaml_from_strings(&[DEFAULT_YAML, overlay])?;
        AutoretrieveConfig::from_loaded(&loaded)
    }

    #[test]
    fn defaults_decode() {
        let cfg = load("").unwrap();
        assert_eq!(cfg.announce.tick_interval(), Duration::from_secs(60));
        assert_eq!(cfg.announce.max_concurrency, 1);
        assert_eq!(cfg.provider.topic, "/indexer/ingest/mainnet");
        assert!(cfg.provider.identity_key_env.is_empty());
    }

    #[test]
    fn overlay_overrides_single_leaf() {
        let cfg = load("announce:\n  tick_interval_secs: 5\n").unwrap();
        assert_eq!(cfg.announce.tick_interval_secs, 5);
        assert_eq!(cfg.announce.publish_timeout_secs, 30);
    }

    #[test]
    fn zero_interval_rejected() {
        let err = load("announce:\n  tick_interval_secs: 0\n").unwrap_err();
        assert!(err.to_string().contains("tick_interval_secs"));
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = load("announce:\n  max_concurrency: 0\n").unwrap_err();
        assert!(err.to_string().contains("max_concurrency"));
    }

    #[test]
    fn indexer_without_peer_id_rejected() {
        let err = load("provider:\n  indexer_multiaddr: \"/ip4/127.0.0.1/tcp/3003\"\n").unwrap_err();
        assert!(err.to_string().contains("indexer_multiaddr"));
    }
}
