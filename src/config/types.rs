//! Top-level configuration types.

use super::{LevelingConfig, ModerationConfig, PersistenceConfig, WatchdogConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration, loaded from a TOML file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub leveling: LevelingConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config = toml::from_str(&raw)?;
        config.warn_degraded();
        Ok(config)
    }

    /// Emit warnings for configuration that degrades specific features.
    pub fn warn_degraded(&self) {
        if self.moderation.enabled && self.moderation.review_channel.is_none() {
            tracing::warn!(
                "[moderation].review_channel is not set; appeals will be refused with a notification"
            );
        }
        if self.bridge.token.is_none() {
            tracing::warn!(
                "[bridge].token is not set; any local process may attach as the connector"
            );
        }
        if self.leveling.enabled && self.leveling.announce_channel.is_none() {
            tracing::warn!(
                "[leveling].announce_channel is not set; level-ups will not be announced"
            );
        }
    }

    /// Local mirror of all guilds' flag counters.
    pub fn flags_file(&self) -> PathBuf {
        self.daemon.data_dir.join("flags.dat")
    }

    /// Durable appeal records.
    pub fn appeals_file(&self) -> PathBuf {
        self.daemon.data_dir.join("appeals.json")
    }

    /// Per-user experience points.
    pub fn xp_file(&self) -> PathBuf {
        self.daemon.data_dir.join("xp.dat")
    }
}

/// Process-level settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Directory for the flat-file mirrors and the appeal store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Prometheus HTTP port. Convention: 0 disables the endpoint.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            metrics_port: default_metrics_port(),
        }
    }
}

/// Connector bridge listener settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Address the daemon listens on for the platform connector.
    #[serde(default = "default_bridge_listen")]
    pub listen: SocketAddr,
    /// Shared secret the connector must present in its hello frame.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: default_bridge_listen(),
            token: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_metrics_port() -> u16 {
    9700
}

fn default_bridge_listen() -> SocketAddr {
    "127.0.0.1:7700".parse().expect("static address")
}
