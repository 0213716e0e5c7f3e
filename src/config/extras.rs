//! Leveling and watchdog configuration.

use super::default_true;
use sentinel_proto::{ChannelId, GuildId};
use serde::Deserialize;
use std::path::PathBuf;

/// Experience-point leveling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LevelingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// XP granted per clean (non-flagged, non-edit) guild message.
    #[serde(default = "default_xp_per_message")]
    pub xp_per_message: u64,
    /// Channel for level-up announcements; silent when unset.
    #[serde(default)]
    pub announce_channel: Option<ChannelId>,
    /// Role reward table, one `level:role_id` per line.
    #[serde(default = "default_roles_path")]
    pub roles_path: PathBuf,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            xp_per_message: default_xp_per_message(),
            announce_channel: None,
            roles_path: default_roles_path(),
        }
    }
}

fn default_xp_per_message() -> u64 {
    2
}

fn default_roles_path() -> PathBuf {
    PathBuf::from("lvl.config")
}

/// Resource health monitoring settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchdogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between resource samples.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Guild whose log channel receives health alerts; tracing-only when
    /// unset.
    #[serde(default)]
    pub alert_guild: Option<GuildId>,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_secs: default_check_interval(),
            alert_guild: None,
        }
    }
}

fn default_check_interval() -> u64 {
    30
}
