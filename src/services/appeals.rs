//! The appeal protocol driver.
//!
//! Reaction events arrive here. A reaction on a tracked warning DM from the
//! warned user opens a review; moderator reactions on the review post
//! resolve it, first responder wins. A periodic sweep times out reviews no
//! moderator answered within the window.

use crate::error::PlatformError;
use crate::persist::scheduler;
use crate::platform::log_to_channel;
use crate::state::{AppealStatus, Warden};
use chrono::{Duration, Utc};
use sentinel_proto::{GuildId, Permission, ReactionEvent, Severity, UserId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Reaction the warned user adds to their warning DM to appeal.
pub const APPEAL_EMOJI: &str = "⚠️";
/// Moderator reaction accepting an appeal.
pub const ACCEPT_EMOJI: &str = "✅";
/// Moderator reaction rejecting an appeal.
pub const REJECT_EMOJI: &str = "❌";

/// Review posts truncate the offending content to this many characters.
const PREVIEW_LIMIT: usize = 1900;

/// Appeals expire this long after the warning (and reviews this long after
/// opening). Wall-clock comparison against stored timestamps, so restarts
/// do not reset the window.
pub fn appeal_window() -> Duration {
    Duration::hours(24)
}

/// Route one reaction event. Unrelated reactions cost a single map lookup.
pub async fn handle_reaction(warden: &Arc<Warden>, reaction: ReactionEvent) {
    if reaction.guild.is_none() {
        handle_dm_reaction(warden, reaction).await;
    } else {
        handle_review_reaction(warden, reaction).await;
    }
}

/// The warned user reacting on their own warning DM.
async fn handle_dm_reaction(warden: &Arc<Warden>, reaction: ReactionEvent) {
    let Some(appeal) = warden.appeals.get(reaction.message) else {
        return;
    };
    if appeal.status != AppealStatus::Warned
        || appeal.user_id != reaction.user
        || reaction.emoji != APPEAL_EMOJI
    {
        return;
    }

    let now = Utc::now();
    if now - appeal.warn_time > appeal_window() {
        warden
            .appeals
            .try_transition(reaction.message, AppealStatus::Warned, |a| {
                a.status = AppealStatus::TimedOut;
                a.review_time = Some(now);
            });
        crate::metrics::record_appeal_transition("timed_out");
        notify(warden, &appeal, "❌ Appeal failed: the 24 hour appeal window has expired.").await;
        return;
    }

    let Some(review_channel) = warden.config.moderation.review_channel else {
        debug!(user = %reaction.user, "appeal refused: no review channel configured");
        notify(
            warden,
            &appeal,
            "❌ Appeal failed: review channel not configured or not found.",
        )
        .await;
        return;
    };

    let text = format!(
        "🔔 Appeal from <@{}> — reason: `{}`\n\nContext:\n```{}```\n\n\
         Moderators: react ✅ to accept (remove 1 flag) or ❌ to reject. \
         (First moderator reaction decides.)",
        appeal.user_id,
        appeal.reason,
        preview(&appeal.context)
    );

    let review_msg = match warden.chat.send_message(review_channel, &text).await {
        Ok(sent) => {
            for emoji in [ACCEPT_EMOJI, REJECT_EMOJI] {
                if let Err(err) = warden.chat.add_reaction(sent.channel, sent.id, emoji).await {
                    debug!(error = %err, "review affordance not added");
                }
            }
            Some(sent.id)
        }
        Err(err) if err.is_rejection() => {
            // The platform refused the channel outright: the review surface
            // does not exist, so the appeal cannot open.
            warn!(channel = %review_channel, error = %err, "review channel unavailable");
            notify(
                warden,
                &appeal,
                "❌ Appeal failed: review channel not configured or not found.",
            )
            .await;
            return;
        }
        Err(err) => {
            // Transient failure: open the review anyway; the sweep resolves
            // it if no moderator ever sees a post.
            warn!(error = %err, "review post not sent");
            None
        }
    };

    warden
        .appeals
        .try_transition(reaction.message, AppealStatus::Warned, |a| {
            a.status = AppealStatus::Appealed;
            a.review_msg_id = review_msg;
            a.review_time = Some(now);
            a.review_by = None;
        });
    crate::metrics::record_appeal_transition("appealed");
    notify(
        warden,
        &appeal,
        "✅ Your appeal was submitted to moderators for review.",
    )
    .await;
}

/// A moderator reacting on a review post.
async fn handle_review_reaction(warden: &Arc<Warden>, reaction: ReactionEvent) {
    let Some(guild) = reaction.guild else {
        return;
    };
    let Some(dm_id) = warden.appeals.lookup_review(reaction.message) else {
        return;
    };
    let Some(appeal) = warden.appeals.get(dm_id) else {
        return;
    };
    if appeal.status != AppealStatus::Appealed {
        return;
    }
    if reaction.emoji != ACCEPT_EMOJI && reaction.emoji != REJECT_EMOJI {
        return;
    }
    if !has_ban_authority(warden, guild, reaction.user).await {
        return;
    }

    let now = Utc::now();
    if reaction.emoji == ACCEPT_EMOJI {
        // try_transition re-checks the status under the entry lock; of two
        // racing moderators only the first applies.
        let Some(updated) = warden
            .appeals
            .try_transition(dm_id, AppealStatus::Appealed, |a| {
                a.status = AppealStatus::Accepted;
                a.review_by = Some(reaction.user);
                a.review_time = Some(now);
            })
        else {
            return;
        };
        crate::metrics::record_appeal_transition("accepted");

        let new_total = warden
            .ledger
            .adjust(updated.guild_id, updated.user_id, -1);
        scheduler::save_guild_flags(warden, updated.guild_id).await;
        debug!(user = %updated.user_id, new_total, "appeal accepted, flag removed");

        notify(
            warden,
            &updated,
            "✅ Your appeal was accepted by moderators. 1 flag removed.",
        )
        .await;
        log_to_channel(
            &warden.chat,
            updated.guild_id,
            format!(
                "🟢 Appeal accepted for <@{}> by <@{}>",
                updated.user_id, reaction.user
            ),
            Severity::Success,
            "appeal",
        );
    } else {
        let Some(updated) = warden
            .appeals
            .try_transition(dm_id, AppealStatus::Appealed, |a| {
                a.status = AppealStatus::Rejected;
                a.review_by = Some(reaction.user);
                a.review_time = Some(now);
            })
        else {
            return;
        };
        crate::metrics::record_appeal_transition("rejected");

        notify(warden, &updated, "❌ Your appeal was rejected by moderators.").await;
        log_to_channel(
            &warden.chat,
            updated.guild_id,
            format!(
                "🔴 Appeal rejected for <@{}> by <@{}>",
                updated.user_id, reaction.user
            ),
            Severity::Info,
            "appeal",
        );
    }
}

/// Force `Appealed` records past the review window into `TimedOut`.
/// Run from a periodic task.
pub async fn sweep_expired(warden: &Arc<Warden>) {
    let now = Utc::now();
    for (dm_id, _) in warden.appeals.expired_appealed(now, appeal_window()) {
        let Some(updated) = warden
            .appeals
            .try_transition(dm_id, AppealStatus::Appealed, |a| {
                a.status = AppealStatus::TimedOut;
                a.review_time = Some(now);
            })
        else {
            continue;
        };
        crate::metrics::record_appeal_transition("timed_out");
        debug!(user = %updated.user_id, "appeal timed out without review");

        notify(
            warden,
            &updated,
            "⏳ No moderator reviewed your appeal within 24 hours — appeal timed out.",
        )
        .await;
        log_to_channel(
            &warden.chat,
            updated.guild_id,
            format!("⚪ Appeal timed out for <@{}>", updated.user_id),
            Severity::Info,
            "appeal",
        );
    }
}

async fn has_ban_authority(warden: &Arc<Warden>, guild: GuildId, user: UserId) -> bool {
    match warden
        .chat
        .member_has(guild, user, Permission::BanMembers)
        .await
    {
        Ok(value) => value,
        Err(err) => {
            debug!(%guild, %user, error = %err, "authority check failed");
            false
        }
    }
}

async fn notify(warden: &Arc<Warden>, appeal: &crate::state::Appeal, text: &str) {
    if let Err(err) = warden.chat.send_dm(appeal.user_id, text).await {
        match err {
            PlatformError::Rejected(_) => {
                debug!(user = %appeal.user_id, "appeal notification refused (DMs closed)");
            }
            other => debug!(user = %appeal.user_id, error = %other, "appeal notification dropped"),
        }
    }
}

/// Cap the offending content for the review post.
fn preview(context: &str) -> String {
    if context.chars().count() <= PREVIEW_LIMIT {
        return context.to_string();
    }
    let mut out: String = context.chars().take(PREVIEW_LIMIT).collect();
    out.push_str("... (truncated)");
    out
}
