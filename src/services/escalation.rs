//! The violation pipeline.
//!
//! Every guild message flows through here: classification against the
//! blocklist, and on a hit the full escalation sequence - delete, count,
//! warn-DM with an appeal handle, timed restriction every Nth flag,
//! lockdown initiation at the limit. Clean messages feed the leveling
//! system instead.
//!
//! Platform side effects are best-effort throughout; a failed delete or DM
//! is logged and the rest of the sequence still runs.

use crate::filter::KeywordHit;
use crate::platform::log_to_channel;
use crate::services::leveling;
use crate::state::{Appeal, Warden};
use chrono::Utc;
use sentinel_proto::{GuildId, MessageEvent, Permission, Severity, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Process one created or edited guild message.
pub async fn handle_message(warden: &Arc<Warden>, message: MessageEvent, is_edit: bool) {
    if message.author_is_bot {
        return;
    }
    let Some(guild) = message.guild else {
        return;
    };

    let hit = if warden.config.moderation.enabled {
        if !warden.config.moderation.filter_affects_admins
            && is_admin(warden, guild, message.author).await
        {
            return;
        }
        classify(warden, &message.content).await
    } else {
        None
    };

    let Some(hit) = hit else {
        if !is_edit && warden.config.leveling.enabled {
            leveling::on_clean_message(warden, guild, message.author).await;
        }
        return;
    };

    crate::metrics::record_flag_issued();
    debug!(%guild, user = %message.author, word = %hit.word, "message flagged");

    // Remove the offending message. Failure is expected when the message is
    // already gone.
    if let Err(err) = warden
        .chat
        .delete_message(message.channel, message.id)
        .await
    {
        debug!(error = %err, "flagged message not deleted");
    }

    let total = warden.ledger.increment(guild, message.author);
    warden.saver.mark_dirty(guild);

    log_to_channel(
        &warden.chat,
        guild,
        format!(
            "[WARN] <@{}> for `{}`\n\nContext: `{}`",
            message.author, hit.word, message.content
        ),
        Severity::Warn,
        "warn",
    );

    send_warning(warden, guild, &message, &hit, is_edit).await;

    let moderation = &warden.config.moderation;
    if moderation.mute_interval > 0 && total % moderation.mute_interval == 0 {
        match warden
            .chat
            .timeout_member(
                guild,
                message.author,
                moderation.mute_seconds,
                "flag multiple timeout",
            )
            .await
        {
            Ok(()) => {
                crate::metrics::record_timeout_applied();
                log_to_channel(
                    &warden.chat,
                    guild,
                    format!(
                        "🔇 Timed out <@{}> for reaching {} flags ({}s)",
                        message.author, total, moderation.mute_seconds
                    ),
                    Severity::Warn,
                    "mute",
                );
            }
            Err(err) => {
                warn!(%guild, user = %message.author, error = %err, "timeout failed");
                log_to_channel(
                    &warden.chat,
                    guild,
                    "❌ Timeout failed".to_string(),
                    Severity::Error,
                    "fail",
                );
            }
        }
    }

    if total >= moderation.flag_limit {
        initiate_lockdown(warden, guild, message.author, "flag_limit").await;
    }
}

/// Run the blocklist scan on the blocking worker pool so a long message or
/// a large automaton never stalls the event loop.
async fn classify(warden: &Arc<Warden>, content: &str) -> Option<KeywordHit> {
    crate::metrics::record_message_scanned();
    let filter = Arc::clone(&warden.filter);
    let text = content.to_string();
    match tokio::task::spawn_blocking(move || filter.classify(&text)).await {
        Ok(hit) => hit,
        Err(err) => {
            warn!(error = %err, "classification task failed");
            None
        }
    }
}

async fn is_admin(warden: &Arc<Warden>, guild: GuildId, user: UserId) -> bool {
    match warden
        .chat
        .member_has(guild, user, Permission::Administrator)
        .await
    {
        Ok(value) => value,
        Err(err) => {
            // Cannot verify; scan anyway rather than silently bypassing.
            debug!(%guild, %user, error = %err, "admin check failed");
            false
        }
    }
}

/// DM the offender, attach the appeal reaction and register the appeal
/// record. A failed DM is logged to the guild; no appeal exists then.
async fn send_warning(
    warden: &Arc<Warden>,
    guild: GuildId,
    message: &MessageEvent,
    hit: &KeywordHit,
    is_edit: bool,
) {
    let sanitized = message.content.replace("```", "'''");
    let prefix = if is_edit { "(Edited) " } else { "" };
    let body = format!(
        "{}{}\n\n```{}```",
        prefix,
        warden
            .config
            .moderation
            .warn_template
            .replace("{word}", &hit.word),
        sanitized
    );

    let dm = match warden.chat.send_dm(message.author, &body).await {
        Ok(dm) => dm,
        Err(err) => {
            warn!(%guild, user = %message.author, error = %err, "warn DM failed");
            log_to_channel(
                &warden.chat,
                guild,
                "❌ Warn DM failed".to_string(),
                Severity::Error,
                "fail",
            );
            return;
        }
    };

    if let Err(err) = warden
        .chat
        .add_reaction(dm.channel, dm.id, crate::services::appeals::APPEAL_EMOJI)
        .await
    {
        debug!(error = %err, "appeal reaction not added to warn DM");
    }

    warden.appeals.insert(
        dm.id,
        Appeal::warned(
            message.author,
            guild,
            message.content.clone(),
            hit.word.clone(),
            Utc::now(),
        ),
    );
    crate::metrics::record_appeal_transition("warned");
}

/// Start the lockdown workflow for a user at or over the flag limit.
///
/// A no-op while a confirmation is already pending, so a user sitting above
/// the limit cannot re-fire this on every message.
pub async fn initiate_lockdown(warden: &Arc<Warden>, guild: GuildId, user: UserId, reason: &str) {
    if !warden.lockdowns.begin(guild, user, reason) {
        return;
    }
    crate::metrics::record_lockdown_initiated();
    warn!(%guild, %user, reason, "lockdown initiated, awaiting confirmation");
    log_to_channel(
        &warden.chat,
        guild,
        format!(
            "⛔ <@{user}> crossed the flag limit ({reason}). \
             A moderator must `/confirm` the penalty or `/revoke` it."
        ),
        Severity::Error,
        "lockdown",
    );
}
