//! Save scheduler: decouples high-frequency counter increments from
//! expensive persistence I/O.
//!
//! Increments mark their guild dirty (a cheap set insertion). A periodic
//! flush drains the dirty set and saves each guild with bounded
//! concurrency; a slower full sweep saves every loaded guild regardless of
//! dirtiness as a durability backstop. A failed save is not re-queued - the
//! guild stays un-persisted until the next sweep.

use crate::persist::{flags_file, PinKind};
use crate::state::Warden;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use sentinel_proto::GuildId;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Dirty-guild tracking plus per-guild save serialization.
#[derive(Default)]
pub struct SaveScheduler {
    dirty: Mutex<HashSet<GuildId>>,
    locks: DashMap<GuildId, Arc<tokio::sync::Mutex<()>>>,
}

impl SaveScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a guild for the next flush. Cheap and synchronous.
    pub fn mark_dirty(&self, guild: GuildId) {
        self.dirty.lock().insert(guild);
    }

    /// Take the current dirty set.
    pub fn drain(&self) -> Vec<GuildId> {
        self.dirty.lock().drain().collect()
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.lock().len()
    }

    /// Per-guild async mutex: two saves for one guild must not interleave
    /// their edit-or-create pin sequences.
    pub fn guild_lock(&self, guild: GuildId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .entry(guild)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Persist one guild: rewrite the whole flat file from the union of loaded
/// guilds, then write the guild's `[FLAGS]` pin. Best-effort throughout.
pub async fn save_guild_flags(warden: &Arc<Warden>, guild: GuildId) {
    let lock = warden.saver.guild_lock(guild);
    let _guard = lock.lock().await;

    let snapshot = warden.ledger.full_snapshot();
    let path = warden.config.flags_file();
    let file_result =
        tokio::task::spawn_blocking(move || flags_file::write_global(&path, &snapshot)).await;
    match file_result {
        Ok(Ok(())) => crate::metrics::record_save("flags_file", "ok"),
        Ok(Err(err)) => {
            warn!(%guild, error = %err, "failed to write flags file");
            crate::metrics::record_save("flags_file", "error");
        }
        Err(err) => {
            warn!(%guild, error = %err, "flags file writer task failed");
            crate::metrics::record_save("flags_file", "error");
        }
    }

    let body = flags_file::render_pin_body(&warden.ledger.guild_snapshot(guild));
    match warden.pins.save(guild, PinKind::Flags, &body).await {
        Ok(()) => crate::metrics::record_save("flags_pin", "ok"),
        Err(err) => {
            warn!(%guild, error = %err, "failed to save flags pin");
            crate::metrics::record_save("flags_pin", "error");
        }
    }
}

/// Rehydrate one guild's counters. The pinned `[FLAGS]` body wins when
/// present and non-empty (and is immediately mirrored back into the flat
/// file); otherwise the flat file, filtered by guild, is used.
pub async fn load_guild_flags(warden: &Arc<Warden>, guild: GuildId) {
    match warden.pins.load(guild, PinKind::Flags).await {
        Ok(Some(body)) => {
            let parsed = flags_file::parse_flag_lines(body.lines(), Some(guild));
            if !parsed.is_empty() {
                debug!(%guild, users = parsed.len(), "loaded flags from pin");
                warden.ledger.replace_guild(guild, parsed);

                // Disaster-recovery sync: the file now includes this guild.
                let snapshot = warden.ledger.full_snapshot();
                let path = warden.config.flags_file();
                let written =
                    tokio::task::spawn_blocking(move || flags_file::write_global(&path, &snapshot))
                        .await;
                match written {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        warn!(%guild, error = %err, "failed to sync flags file after pin load");
                    }
                    Err(err) => warn!(%guild, error = %err, "flags file writer task failed"),
                }
                return;
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!(%guild, error = %err, "failed to read flags pin");
        }
    }

    let path = warden.config.flags_file();
    let global = tokio::task::spawn_blocking(move || flags_file::load_global(&path)).await;
    match global {
        Ok(mut global) => {
            if let Some(entries) = global.remove(&guild) {
                debug!(%guild, users = entries.len(), "loaded flags from file");
                warden.ledger.replace_guild(guild, entries);
            }
        }
        Err(err) => warn!(%guild, error = %err, "flags file reader task failed"),
    }
}

/// Drain the dirty set and save each guild, at most
/// `save_concurrency` guilds in flight.
pub async fn flush_dirty(warden: &Arc<Warden>) {
    let dirty = warden.saver.drain();
    if dirty.is_empty() {
        return;
    }
    debug!(guilds = dirty.len(), "flushing dirty guilds");
    let concurrency = warden.config.persistence.save_concurrency.max(1);
    stream::iter(dirty)
        .for_each_concurrent(concurrency, |guild| async move {
            save_guild_flags(warden, guild).await;
        })
        .await;
}

/// Save every guild with in-memory state, regardless of dirtiness.
pub async fn sweep_all(warden: &Arc<Warden>) {
    let guilds = warden.ledger.guild_ids();
    if guilds.is_empty() {
        return;
    }
    let concurrency = warden.config.persistence.save_concurrency.max(1);
    stream::iter(guilds)
        .for_each_concurrent(concurrency, |guild| async move {
            save_guild_flags(warden, guild).await;
        })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_and_drain() {
        let saver = SaveScheduler::new();
        saver.mark_dirty(GuildId(1));
        saver.mark_dirty(GuildId(2));
        saver.mark_dirty(GuildId(1));
        assert_eq!(saver.dirty_len(), 2);

        let mut drained = saver.drain();
        drained.sort();
        assert_eq!(drained, vec![GuildId(1), GuildId(2)]);
        assert_eq!(saver.dirty_len(), 0);
    }

    #[test]
    fn guild_lock_is_stable() {
        let saver = SaveScheduler::new();
        let a = saver.guild_lock(GuildId(1));
        let b = saver.guild_lock(GuildId(1));
        assert!(Arc::ptr_eq(&a, &b));
        let c = saver.guild_lock(GuildId(2));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
