//! Configuration loading and management.
//!
//! Split into logical submodules:
//! - [`types`]: top-level [`Config`] plus daemon/bridge sections
//! - [`moderation`]: filter, escalation and persistence tuning
//! - [`extras`]: leveling and watchdog sections

mod extras;
mod moderation;
mod types;

pub use extras::{LevelingConfig, WatchdogConfig};
pub use moderation::{ModerationConfig, PersistenceConfig};
pub use types::{BridgeConfig, Config, DaemonConfig};

pub(crate) fn default_true() -> bool {
    true
}
