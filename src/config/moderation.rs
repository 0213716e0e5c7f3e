//! Moderation filter, escalation and persistence configuration.

use super::default_true;
use sentinel_proto::ChannelId;
use serde::Deserialize;
use std::path::PathBuf;

/// Keyword filter and escalation thresholds.
#[derive(Debug, Clone, Deserialize)]
pub struct ModerationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Keyword blocklist, one keyword per line, `#` comments allowed.
    #[serde(default = "default_blocklist_path")]
    pub blocklist_path: PathBuf,
    /// When false, members with administrator rights bypass the filter.
    #[serde(default)]
    pub filter_affects_admins: bool,
    /// Warning DM template. `{word}` is replaced with the matched keyword;
    /// the offending content is appended in a code fence.
    #[serde(default = "default_warn_template")]
    pub warn_template: String,
    /// Duration of the timed restriction applied every
    /// `mute_interval`-th flag, in seconds.
    #[serde(default = "default_mute_seconds")]
    pub mute_seconds: u64,
    /// Apply a timed restriction whenever the flag total is a multiple of
    /// this value.
    #[serde(default = "default_mute_interval")]
    pub mute_interval: u32,
    /// Flag total at which the lockdown workflow is initiated.
    #[serde(default = "default_flag_limit")]
    pub flag_limit: u32,
    /// Channel receiving appeal review posts. Appeals are refused (with a
    /// notification to the appellant) when unset.
    #[serde(default)]
    pub review_channel: Option<ChannelId>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            blocklist_path: default_blocklist_path(),
            filter_affects_admins: false,
            warn_template: default_warn_template(),
            mute_seconds: default_mute_seconds(),
            mute_interval: default_mute_interval(),
            flag_limit: default_flag_limit(),
            review_channel: None,
        }
    }
}

fn default_blocklist_path() -> PathBuf {
    PathBuf::from("banned-keywords.config")
}

fn default_warn_template() -> String {
    "⚠️ Your message was removed for containing `{word}`. \
     React to this message with ⚠️ within 24 hours to appeal the warning."
        .to_string()
}

fn default_mute_seconds() -> u64 {
    600
}

fn default_mute_interval() -> u32 {
    5
}

fn default_flag_limit() -> u32 {
    10
}

/// Save scheduler and memory channel tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Name of the private per-guild memory channel holding the pins.
    #[serde(default = "default_memory_channel")]
    pub memory_channel: String,
    /// Seconds between drains of the dirty-guild set.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_secs: u64,
    /// Seconds between full sweeps of every loaded guild.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Concurrent guild saves during a drain or sweep.
    #[serde(default = "default_save_concurrency")]
    pub save_concurrency: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            memory_channel: default_memory_channel(),
            flush_interval_secs: default_flush_interval(),
            sweep_interval_secs: default_sweep_interval(),
            save_concurrency: default_save_concurrency(),
        }
    }
}

fn default_memory_channel() -> String {
    "mod-mem".to_string()
}

fn default_flush_interval() -> u64 {
    5
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_save_concurrency() -> usize {
    6
}
