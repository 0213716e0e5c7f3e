//! Moderator command surface.
//!
//! These operations back the connector's slash commands. Authorization is
//! checked here, not trusted from the connector; an unauthorized call is a
//! rejection surfaced to the invoker, never a logged fault. Each returns
//! the reply text to show the moderator.

use crate::error::{CommandError, CommandResult};
use crate::persist::scheduler;
use crate::platform::log_to_channel;
use crate::state::Warden;
use regex::Regex;
use sentinel_proto::{ChannelId, GuildId, Permission, Severity, UserId};
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{debug, info};

/// Route a connector command to its operation and answer in-channel.
pub async fn dispatch_command(
    warden: &Arc<Warden>,
    guild: GuildId,
    channel: ChannelId,
    invoker: UserId,
    name: &str,
    args: &[String],
) {
    let result = match name {
        "flags" => flags_overview(warden, guild, invoker, args.first().map(String::as_str)).await,
        "modflags" => match (args.first(), args.get(1).and_then(|raw| raw.parse().ok())) {
            (Some(target), Some(delta)) => {
                adjust_flags(warden, guild, invoker, target, delta).await
            }
            _ => Err(CommandError::InvalidTarget(args.join(" "))),
        },
        "confirm" => match args.first() {
            Some(target) => confirm_lockdown(warden, guild, invoker, target).await,
            None => Err(CommandError::InvalidTarget(String::new())),
        },
        "revoke" => match args.first() {
            Some(target) => revoke_lockdown(warden, guild, invoker, target).await,
            None => Err(CommandError::InvalidTarget(String::new())),
        },
        other => {
            debug!(command = other, "unknown command ignored");
            return;
        }
    };

    let reply = match result {
        Ok(text) => text,
        Err(err) => {
            crate::metrics::record_command_rejected(name, err.error_code());
            err.user_message()
        }
    };
    if let Err(err) = warden.chat.send_message(channel, &reply).await {
        debug!(error = %err, "command reply dropped");
    }
}

fn user_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d{5,25})").expect("static pattern"))
}

/// Extract a user id from a raw argument: a mention, a bare id, or anything
/// containing one.
pub fn parse_user_arg(raw: &str) -> Result<UserId, CommandError> {
    user_id_pattern()
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| CommandError::InvalidTarget(raw.to_string()))
}

async fn require(
    warden: &Arc<Warden>,
    guild: GuildId,
    invoker: UserId,
    permission: Permission,
) -> Result<(), CommandError> {
    match warden.chat.member_has(guild, invoker, permission).await {
        Ok(true) => Ok(()),
        _ => Err(CommandError::NotAuthorized),
    }
}

/// `/flags [user]` - list one user's total or every flagged member.
pub async fn flags_overview(
    warden: &Arc<Warden>,
    guild: GuildId,
    invoker: UserId,
    target: Option<&str>,
) -> CommandResult {
    require(warden, guild, invoker, Permission::BanMembers).await?;

    match target {
        None => {
            let flagged: Vec<(UserId, u32)> = warden
                .ledger
                .guild_snapshot(guild)
                .into_iter()
                .filter(|(_, total)| *total > 0)
                .collect();
            if flagged.is_empty() {
                return Ok("No flagged members.".to_string());
            }
            let mut out = String::from("Flagged members:\n");
            for (user, total) in flagged {
                out.push_str(&format!("<@{user}> — {total} flags\n"));
            }
            Ok(out)
        }
        Some(raw) => {
            let user = parse_user_arg(raw)?;
            let total = warden.ledger.total(guild, user);
            Ok(format!("<@{user}> has {total} flags."))
        }
    }
}

/// `/modflags <user> <amount>` - manual counter correction, clamped at
/// zero.
pub async fn adjust_flags(
    warden: &Arc<Warden>,
    guild: GuildId,
    invoker: UserId,
    target: &str,
    delta: i64,
) -> CommandResult {
    require(warden, guild, invoker, Permission::BanMembers).await?;
    let user = parse_user_arg(target)?;

    let before = warden.ledger.total(guild, user);
    let after = warden.ledger.adjust(guild, user, delta);
    info!(%guild, %user, before, after, "flags adjusted by moderator");

    log_to_channel(
        &warden.chat,
        guild,
        format!("🛠 <@{invoker}> adjusted total flags for <@{user}>: {before} → {after}"),
        Severity::Info,
        "modflags",
    );
    scheduler::save_guild_flags(warden, guild).await;

    Ok(format!("✅ <@{user}> total flags: {before} → {after}"))
}

/// `/confirm <user>` - apply the pending severe penalty: ban the user,
/// clear the pending entry and reset their counter.
pub async fn confirm_lockdown(
    warden: &Arc<Warden>,
    guild: GuildId,
    invoker: UserId,
    target: &str,
) -> CommandResult {
    require(warden, guild, invoker, Permission::BanMembers).await?;
    let user = parse_user_arg(target)?;

    let pending = warden
        .lockdowns
        .take(guild, user)
        .ok_or(CommandError::NothingPending)?;

    if let Err(err) = warden
        .chat
        .ban_member(guild, user, &format!("lockdown confirmed ({})", pending.reason))
        .await
    {
        // Re-arm so the confirmation can be retried.
        warden.lockdowns.begin(guild, user, &pending.reason);
        tracing::warn!(%guild, %user, error = %err, "lockdown ban failed");
        return Ok("❌ Ban failed; the lockdown is still pending.".to_string());
    }

    warden.ledger.adjust(guild, user, -i64::from(u32::MAX));
    scheduler::save_guild_flags(warden, guild).await;

    log_to_channel(
        &warden.chat,
        guild,
        format!(
            "🔨 Lockdown confirmed by <@{invoker}>: <@{user}> banned ({})",
            pending.reason
        ),
        Severity::Error,
        "lockdown",
    );
    Ok(format!("✅ Penalty confirmed. <@{user}> has been banned."))
}

/// `/revoke <user>` - cancel the pending penalty.
pub async fn revoke_lockdown(
    warden: &Arc<Warden>,
    guild: GuildId,
    invoker: UserId,
    target: &str,
) -> CommandResult {
    require(warden, guild, invoker, Permission::BanMembers).await?;
    let user = parse_user_arg(target)?;

    let _pending = warden
        .lockdowns
        .take(guild, user)
        .ok_or(CommandError::NothingPending)?;

    log_to_channel(
        &warden.chat,
        guild,
        format!("↩️ Lockdown revoked for <@{user}> by <@{invoker}>"),
        Severity::Success,
        "lockdown",
    );
    Ok(format!("✅ Lockdown revoked for <@{user}>."))
}
