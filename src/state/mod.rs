//! Shared daemon state.
//!
//! The [`Warden`] is the hub every handler and background task hangs off:
//! configuration, the platform seam, and one manager per concern. Its
//! lifecycle is bound to the process; the ledger and appeal table are
//! rehydrated from the persistence backend at startup and flushed
//! opportunistically, never treated as instantaneously durable.

pub mod appeals;
pub mod ledger;
pub mod lockdown;

pub use appeals::{Appeal, AppealStatus, AppealStore};
pub use ledger::{FlagCounter, FlagLedger};
pub use lockdown::{LockdownManager, PendingLockdown};

use crate::config::Config;
use crate::filter::KeywordFilter;
use crate::persist::{PinStore, SaveScheduler};
use crate::platform::ChatApi;
use crate::services::leveling::{self, XpLedger};
use dashmap::DashSet;
use sentinel_proto::{GuildId, RoleId};
use std::sync::Arc;
use tracing::info;

/// Process-wide moderation state.
pub struct Warden {
    pub config: Config,
    pub chat: Arc<dyn ChatApi>,
    pub filter: Arc<KeywordFilter>,
    pub ledger: FlagLedger,
    pub appeals: AppealStore,
    pub lockdowns: LockdownManager,
    pub saver: SaveScheduler,
    pub pins: PinStore,
    pub xp: XpLedger,
    /// Level reward table, sorted ascending by level.
    pub rewards: Vec<(u32, RoleId)>,
    /// Guilds the connector has announced.
    guilds: DashSet<GuildId>,
}

/// Parameters for building a [`Warden`].
pub struct WardenParams {
    pub config: Config,
    pub chat: Arc<dyn ChatApi>,
}

impl Warden {
    pub fn new(params: WardenParams) -> Arc<Self> {
        let WardenParams { config, chat } = params;

        let filter = Arc::new(KeywordFilter::load(config.moderation.blocklist_path.clone()));
        info!(keywords = filter.len(), "keyword blocklist loaded");

        let appeals = AppealStore::load(config.appeals_file());
        info!(appeals = appeals.len(), "appeal store loaded");

        let pins = PinStore::new(
            Arc::clone(&chat),
            config.persistence.memory_channel.clone(),
        );
        let xp = XpLedger::load(&config.xp_file());
        let rewards = leveling::load_reward_table(&config.leveling.roles_path);
        if !rewards.is_empty() {
            info!(rewards = rewards.len(), "level reward table loaded");
        }

        Arc::new(Self {
            config,
            chat,
            filter,
            ledger: FlagLedger::new(),
            appeals,
            lockdowns: LockdownManager::new(),
            saver: SaveScheduler::new(),
            pins,
            xp,
            rewards,
            guilds: DashSet::new(),
        })
    }

    /// Record a guild as known. Returns `true` on first sight.
    pub fn register_guild(&self, guild: GuildId) -> bool {
        self.guilds.insert(guild)
    }

    pub fn known_guilds(&self) -> Vec<GuildId> {
        self.guilds.iter().map(|entry| *entry).collect()
    }
}
