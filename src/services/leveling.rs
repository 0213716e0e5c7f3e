//! Experience-point leveling with role rewards.
//!
//! Clean (non-flagged, non-edit) guild messages earn XP. The level curve is
//! piecewise: the first three levels cost 20, 35 and 40 XP, every later
//! level costs 20 more than the previous one, capped at level 1000. Reward
//! roles come from a `level:role_id` table file; on level-up the highest
//! earned reward is applied and lower ones are removed.
//!
//! XP is persisted to `xp.dat` (`user:xp` lines) and mirrored into each
//! guild's `[XP]` pin by a periodic push task.

use crate::persist::PinKind;
use crate::platform::log_to_channel;
use crate::state::Warden;
use dashmap::DashMap;
use futures_util::stream::{self, StreamExt};
use sentinel_proto::{GuildId, RoleId, Severity, UserId};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_LEVEL: u32 = 1000;
const XP_INCREMENTS: [u64; 3] = [20, 35, 40];
const XP_EXTRA_STEP: u64 = 20;

/// Position within the level curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelInfo {
    pub level: u32,
    pub into_current: u64,
    pub for_next: u64,
    pub to_next: u64,
}

/// Walk the piecewise curve for a total XP amount.
pub fn level_info(xp: u64) -> LevelInfo {
    let mut level: u32 = 0;
    let mut remaining = xp;

    for inc in XP_INCREMENTS {
        if remaining >= inc {
            remaining -= inc;
            level += 1;
        } else {
            return LevelInfo {
                level: level.min(MAX_LEVEL),
                into_current: remaining,
                for_next: inc,
                to_next: inc - remaining,
            };
        }
    }

    while level < MAX_LEVEL {
        let next_inc =
            XP_INCREMENTS[XP_INCREMENTS.len() - 1] + XP_EXTRA_STEP * u64::from(level - 2);
        if remaining >= next_inc {
            remaining -= next_inc;
            level += 1;
        } else {
            return LevelInfo {
                level,
                into_current: remaining,
                for_next: next_inc,
                to_next: next_inc - remaining,
            };
        }
    }

    LevelInfo {
        level: MAX_LEVEL,
        into_current: 0,
        for_next: 0,
        to_next: 0,
    }
}

pub fn level_for(xp: u64) -> u32 {
    level_info(xp).level
}

/// Unicode progress bar, `current` out of `total`.
pub fn progress_bar(current: u64, total: u64, length: usize) -> String {
    if total == 0 {
        return "█".repeat(length);
    }
    let fraction = (current as f64 / total as f64).clamp(0.0, 1.0);
    let filled = (fraction * length as f64) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(length - filled))
}

/// Parse the `level:role_id` reward table, sorted ascending by level.
pub fn load_reward_table(path: &Path) -> Vec<(u32, RoleId)> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(err) => {
            warn!(error = %err, path = %path.display(), "failed to read level reward table");
            return Vec::new();
        }
    };

    let mut rewards: Vec<(u32, RoleId)> = raw
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let (level, role) = line.split_once(':')?;
            Some((
                level.trim().parse().ok()?,
                RoleId(role.trim().parse().ok()?),
            ))
        })
        .collect();
    rewards.sort_by_key(|(level, _)| *level);
    rewards
}

/// The reward earned at `level`: the highest table entry at or below it.
pub fn reward_for(rewards: &[(u32, RoleId)], level: u32) -> Option<RoleId> {
    rewards
        .iter()
        .take_while(|(threshold, _)| level >= *threshold)
        .last()
        .map(|(_, role)| *role)
}

/// Per-user XP totals with their file mirror.
pub struct XpLedger {
    users: DashMap<UserId, u64>,
    /// Set once XP has been seeded (from the file or the first non-empty
    /// pin); later pin bodies no longer overwrite memory.
    initialized: AtomicBool,
}

impl XpLedger {
    /// Load `user:xp` lines from the file mirror. Malformed lines are
    /// skipped.
    pub fn load(path: &Path) -> Self {
        let ledger = Self {
            users: DashMap::new(),
            initialized: AtomicBool::new(false),
        };
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return ledger,
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to read xp file");
                return ledger;
            }
        };
        for line in raw.lines() {
            let line = line.trim();
            let Some((user, xp)) = line.split_once(':') else {
                continue;
            };
            let (Ok(user), Ok(xp)) = (user.trim().parse::<u64>(), xp.trim().parse::<u64>()) else {
                continue;
            };
            ledger.users.insert(UserId(user), xp);
        }
        if !ledger.users.is_empty() {
            ledger.initialized.store(true, Ordering::Release);
        }
        ledger
    }

    pub fn get(&self, user: UserId) -> u64 {
        self.users.get(&user).map(|entry| *entry).unwrap_or(0)
    }

    /// Add XP, returning `(previous, new)` totals.
    pub fn award(&self, user: UserId, amount: u64) -> (u64, u64) {
        let mut entry = self.users.entry(user).or_insert(0);
        let previous = *entry;
        *entry = previous.saturating_add(amount);
        (previous, *entry)
    }

    /// Seed from a pin body, only if nothing has been loaded yet.
    pub fn init_from(&self, entries: impl IntoIterator<Item = (UserId, u64)>) -> bool {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        for (user, xp) in entries {
            self.users.insert(user, xp);
        }
        true
    }

    /// All totals, sorted by user id.
    pub fn snapshot(&self) -> Vec<(UserId, u64)> {
        let mut out: Vec<(UserId, u64)> = self
            .users
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        out.sort_by_key(|(user, _)| *user);
        out
    }
}

/// Parse an `[XP]` pin body.
pub fn parse_xp_body(body: &str) -> Vec<(UserId, u64)> {
    body.lines()
        .filter_map(|line| {
            let (user, xp) = line.trim().split_once(':')?;
            Some((
                UserId(user.trim().parse().ok()?),
                xp.trim().parse::<u64>().ok()?,
            ))
        })
        .collect()
}

/// Render the `[XP]` pin body.
pub fn render_xp_body(entries: &[(UserId, u64)]) -> String {
    let mut body = String::new();
    for (user, xp) in entries {
        body.push_str(&format!("{user}:{xp}\n"));
    }
    body
}

/// Award XP for a clean guild message and announce a level-up when one
/// happened.
pub async fn on_clean_message(warden: &Arc<Warden>, guild: GuildId, author: UserId) {
    let cfg = &warden.config.leveling;
    let (previous, new) = warden.xp.award(author, cfg.xp_per_message);
    crate::metrics::record_xp_awarded(cfg.xp_per_message);

    // Mirror the file on every award; the pin is pushed periodically.
    let snapshot = warden.xp.snapshot();
    let path = warden.config.xp_file();
    let written = tokio::task::spawn_blocking(move || write_xp_file(&path, &snapshot)).await;
    match written {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "failed to write xp file"),
        Err(err) => warn!(error = %err, "xp file writer task failed"),
    }

    let prev_level = level_for(previous);
    let new_level = level_for(new);
    if new_level <= prev_level {
        return;
    }

    let reward = apply_level_reward(warden, guild, author, new_level).await;

    if let Some(channel) = cfg.announce_channel {
        let mut text = format!(
            "🎉 <@{author}> leveled up! **{prev_level}** -> **{new_level}**"
        );
        if let Some(role) = reward {
            text.push_str(&format!("\nUnlocked role: <@&{role}>"));
        }
        if let Err(err) = warden.chat.send_message(channel, &text).await {
            debug!(error = %err, "level-up announcement dropped");
        }
    }
    log_to_channel(
        &warden.chat,
        guild,
        format!("📈 <@{author}> reached level {new_level}"),
        Severity::Info,
        "level",
    );
}

/// Grant the reward for `level` and clear lower rewards. Returns the newly
/// granted role, if the table yielded one.
async fn apply_level_reward(
    warden: &Arc<Warden>,
    guild: GuildId,
    user: UserId,
    level: u32,
) -> Option<RoleId> {
    let reward = reward_for(&warden.rewards, level)?;
    for (_, role) in &warden.rewards {
        if *role != reward {
            if let Err(err) = warden.chat.remove_role(guild, user, *role).await {
                debug!(%guild, %user, role = %role, error = %err, "stale reward role not removed");
            }
        }
    }
    if let Err(err) = warden.chat.add_role(guild, user, reward).await {
        warn!(%guild, %user, role = %reward, error = %err, "failed to grant reward role");
        return None;
    }
    Some(reward)
}

fn write_xp_file(path: &Path, snapshot: &[(UserId, u64)]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut body = String::new();
    for (user, xp) in snapshot {
        body.push_str(&format!("{user}:{xp}\n"));
    }
    std::fs::write(path, body)
}

/// Seed XP from a guild's `[XP]` pin if nothing has been loaded yet, and
/// make sure the pin exists for future pushes.
pub async fn init_guild_xp(warden: &Arc<Warden>, guild: GuildId) {
    if !warden.config.leveling.enabled {
        return;
    }
    match warden.pins.load(guild, PinKind::Xp).await {
        Ok(Some(body)) => {
            let entries = parse_xp_body(&body);
            if !entries.is_empty() && warden.xp.init_from(entries) {
                debug!(%guild, "seeded xp from pin");
            }
        }
        Ok(None) => {
            let body = render_xp_body(&warden.xp.snapshot());
            if let Err(err) = warden.pins.save(guild, PinKind::Xp, &body).await {
                warn!(%guild, error = %err, "failed to create xp pin");
            }
        }
        Err(err) => warn!(%guild, error = %err, "failed to read xp pin"),
    }
}

/// Push the XP table into every known guild's `[XP]` pin, bounded.
pub async fn push_xp_pins(warden: &Arc<Warden>) {
    if !warden.config.leveling.enabled {
        return;
    }
    let guilds = warden.known_guilds();
    if guilds.is_empty() {
        return;
    }
    let body = Arc::new(render_xp_body(&warden.xp.snapshot()));
    let concurrency = warden.config.persistence.save_concurrency.max(1);
    stream::iter(guilds)
        .for_each_concurrent(concurrency, |guild| {
            let body = Arc::clone(&body);
            async move {
                match warden.pins.save(guild, PinKind::Xp, &body).await {
                    Ok(()) => crate::metrics::record_save("xp_pin", "ok"),
                    Err(err) => {
                        warn!(%guild, error = %err, "failed to push xp pin");
                        crate::metrics::record_save("xp_pin", "error");
                    }
                }
            }
        })
        .await;
}
