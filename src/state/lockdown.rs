//! Lockdown confirm/revoke state.
//!
//! A user who crosses the flag limit enters a pending-confirmation state.
//! While that entry exists, further limit crossings are no-ops, so a user
//! sitting above the limit cannot re-trigger the workflow on every message.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sentinel_proto::{GuildId, UserId};

/// A severe-penalty workflow awaiting moderator confirmation.
#[derive(Debug, Clone)]
pub struct PendingLockdown {
    pub reason: String,
    pub initiated_at: DateTime<Utc>,
}

/// Pending confirmations, per guild.
#[derive(Default)]
pub struct LockdownManager {
    pending: DashMap<GuildId, DashMap<UserId, PendingLockdown>>,
}

impl LockdownManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the pending state. Returns `false` (and changes nothing) when
    /// a confirmation is already pending for this user.
    pub fn begin(&self, guild: GuildId, user: UserId, reason: &str) -> bool {
        let users = self.pending.entry(guild).or_default();
        let result = match users.entry(user) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(PendingLockdown {
                    reason: reason.to_string(),
                    initiated_at: Utc::now(),
                });
                true
            }
        };
        result
    }

    /// Remove and return the pending entry (confirm or revoke path).
    pub fn take(&self, guild: GuildId, user: UserId) -> Option<PendingLockdown> {
        self.pending
            .get(&guild)
            .and_then(|users| users.remove(&user))
            .map(|(_, pending)| pending)
    }

    pub fn is_pending(&self, guild: GuildId, user: UserId) -> bool {
        self.pending
            .get(&guild)
            .is_some_and(|users| users.contains_key(&user))
    }

    /// All pending confirmations for a guild, sorted by user id.
    pub fn pending_for(&self, guild: GuildId) -> Vec<(UserId, PendingLockdown)> {
        let mut out: Vec<(UserId, PendingLockdown)> = self
            .pending
            .get(&guild)
            .map(|users| {
                users
                    .iter()
                    .map(|entry| (*entry.key(), entry.value().clone()))
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|(user, _)| *user);
        out
    }
}
