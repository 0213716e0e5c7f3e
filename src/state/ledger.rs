//! The flag ledger: per-(guild, user) infraction counters.
//!
//! Authoritative while the process runs; rehydrated from the persistence
//! backend at startup and flushed by the save scheduler. All mutation goes
//! through entry locks, so increments for the same key never interleave.

use dashmap::DashMap;
use sentinel_proto::{GuildId, UserId};

/// One user's counter state within a guild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagCounter {
    pub flags_total: u32,
}

/// In-memory mapping `guild -> user -> counter`.
#[derive(Default)]
pub struct FlagLedger {
    guilds: DashMap<GuildId, DashMap<UserId, FlagCounter>>,
}

impl FlagLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one infraction. Returns the new total.
    pub fn increment(&self, guild: GuildId, user: UserId) -> u32 {
        let users = self.guilds.entry(guild).or_default();
        let mut counter = users.entry(user).or_default();
        counter.flags_total = counter.flags_total.saturating_add(1);
        counter.flags_total
    }

    /// Manual adjustment (admin correction, appeal reversal). The result is
    /// clamped at zero. Returns the new total.
    pub fn adjust(&self, guild: GuildId, user: UserId, delta: i64) -> u32 {
        let users = self.guilds.entry(guild).or_default();
        let mut counter = users.entry(user).or_default();
        let next = (i64::from(counter.flags_total) + delta).max(0);
        counter.flags_total = next.min(i64::from(u32::MAX)) as u32;
        counter.flags_total
    }

    /// Current total for a user; zero when untracked.
    pub fn total(&self, guild: GuildId, user: UserId) -> u32 {
        self.guilds
            .get(&guild)
            .and_then(|users| users.get(&user).map(|c| c.flags_total))
            .unwrap_or(0)
    }

    /// Replace a guild's counters wholesale (rehydration).
    pub fn replace_guild(&self, guild: GuildId, entries: impl IntoIterator<Item = (UserId, u32)>) {
        let users = DashMap::new();
        for (user, total) in entries {
            users.insert(user, FlagCounter { flags_total: total });
        }
        self.guilds.insert(guild, users);
    }

    /// All counters for one guild, sorted by user id for deterministic
    /// serialization.
    pub fn guild_snapshot(&self, guild: GuildId) -> Vec<(UserId, u32)> {
        let mut out: Vec<(UserId, u32)> = self
            .guilds
            .get(&guild)
            .map(|users| {
                users
                    .iter()
                    .map(|entry| (*entry.key(), entry.value().flags_total))
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|(user, _)| *user);
        out
    }

    /// The union of every loaded guild's counters, sorted.
    pub fn full_snapshot(&self) -> Vec<(GuildId, UserId, u32)> {
        let mut out = Vec::new();
        for guild_entry in self.guilds.iter() {
            let guild = *guild_entry.key();
            for user_entry in guild_entry.value().iter() {
                out.push((guild, *user_entry.key(), user_entry.value().flags_total));
            }
        }
        out.sort();
        out
    }

    /// Guilds with any in-memory state.
    pub fn guild_ids(&self) -> Vec<GuildId> {
        self.guilds.iter().map(|entry| *entry.key()).collect()
    }
}
