//! Lockdown confirm/revoke and the moderator command surface.

mod common;

use common::{guild_message, harness_with};
use sentinel_proto::{ChannelId, GuildId, Permission, UserId};
use sentineld::error::CommandError;
use sentineld::services::{escalation, moderation};

const GUILD: GuildId = GuildId(1);
const USER: UserId = UserId(123456789);
const MODERATOR: UserId = UserId(777777777);
const REPLY_CHANNEL: ChannelId = ChannelId(42);

fn low_limit() -> common::Harness {
    harness_with(|config| {
        config.moderation.flag_limit = 2;
    })
}

async fn cross_the_limit(h: &common::Harness) {
    for i in 0..2 {
        escalation::handle_message(
            &h.warden,
            guild_message(GUILD.0, 10, 900 + i, USER.0, "foo"),
            false,
        )
        .await;
    }
    assert!(h.warden.lockdowns.is_pending(GUILD, USER));
}

#[tokio::test]
async fn confirm_bans_clears_and_resets() {
    let h = low_limit();
    h.chat.grant(GUILD, MODERATOR, Permission::BanMembers);
    cross_the_limit(&h).await;

    let reply = moderation::confirm_lockdown(&h.warden, GUILD, MODERATOR, &USER.to_string())
        .await
        .unwrap();
    assert!(reply.contains("banned"));

    assert_eq!(h.chat.bans(GUILD), vec![USER]);
    assert!(!h.warden.lockdowns.is_pending(GUILD, USER));
    assert_eq!(h.warden.ledger.total(GUILD, USER), 0);
}

#[tokio::test]
async fn confirm_requires_ban_authority() {
    let h = low_limit();
    cross_the_limit(&h).await;

    let err = moderation::confirm_lockdown(&h.warden, GUILD, MODERATOR, &USER.to_string())
        .await
        .unwrap_err();
    assert_eq!(err, CommandError::NotAuthorized);
    assert!(h.chat.bans(GUILD).is_empty());
    assert!(h.warden.lockdowns.is_pending(GUILD, USER));
}

#[tokio::test]
async fn confirm_without_pending_is_rejected() {
    let h = low_limit();
    h.chat.grant(GUILD, MODERATOR, Permission::BanMembers);

    let err = moderation::confirm_lockdown(&h.warden, GUILD, MODERATOR, &USER.to_string())
        .await
        .unwrap_err();
    assert_eq!(err, CommandError::NothingPending);
}

#[tokio::test]
async fn failed_ban_rearms_the_lockdown() {
    let h = low_limit();
    h.chat.grant(GUILD, MODERATOR, Permission::BanMembers);
    cross_the_limit(&h).await;
    h.chat.fail_op("ban_member");

    let reply = moderation::confirm_lockdown(&h.warden, GUILD, MODERATOR, &USER.to_string())
        .await
        .unwrap();
    assert!(reply.contains("still pending"));
    assert!(h.warden.lockdowns.is_pending(GUILD, USER));
}

#[tokio::test]
async fn revoke_clears_without_penalty() {
    let h = low_limit();
    h.chat.grant(GUILD, MODERATOR, Permission::BanMembers);
    cross_the_limit(&h).await;

    let reply = moderation::revoke_lockdown(&h.warden, GUILD, MODERATOR, &USER.to_string())
        .await
        .unwrap();
    assert!(reply.contains("revoked"));
    assert!(!h.warden.lockdowns.is_pending(GUILD, USER));
    assert!(h.chat.bans(GUILD).is_empty());
    // The counter is untouched; a later flag may restart the workflow.
    assert_eq!(h.warden.ledger.total(GUILD, USER), 2);
}

#[tokio::test]
async fn modflags_adjusts_and_clamps() {
    let h = low_limit();
    h.chat.grant(GUILD, MODERATOR, Permission::BanMembers);

    let reply =
        moderation::adjust_flags(&h.warden, GUILD, MODERATOR, &format!("<@{USER}>"), 3)
            .await
            .unwrap();
    assert!(reply.contains("0 → 3"));
    assert_eq!(h.warden.ledger.total(GUILD, USER), 3);

    let reply = moderation::adjust_flags(&h.warden, GUILD, MODERATOR, &USER.to_string(), -10)
        .await
        .unwrap();
    assert!(reply.contains("3 → 0"));
    assert_eq!(h.warden.ledger.total(GUILD, USER), 0);
}

#[tokio::test]
async fn flags_overview_lists_flagged_members() {
    let h = low_limit();
    h.chat.grant(GUILD, MODERATOR, Permission::BanMembers);
    h.warden.ledger.adjust(GUILD, USER, 4);

    let all = moderation::flags_overview(&h.warden, GUILD, MODERATOR, None)
        .await
        .unwrap();
    assert!(all.contains(&format!("<@{USER}>")));
    assert!(all.contains('4'));

    let one = moderation::flags_overview(&h.warden, GUILD, MODERATOR, Some(&USER.to_string()))
        .await
        .unwrap();
    assert!(one.contains("4 flags"));

    let none = moderation::flags_overview(&h.warden, GUILD, MODERATOR, Some("987654321"))
        .await
        .unwrap();
    assert!(none.contains("0 flags"));
}

#[tokio::test]
async fn dispatch_answers_in_channel_and_rejects_unauthorized() {
    let h = low_limit();

    moderation::dispatch_command(
        &h.warden,
        GUILD,
        REPLY_CHANNEL,
        MODERATOR,
        "flags",
        &[],
    )
    .await;

    let replies = h.chat.sent_to(REPLY_CHANNEL);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].1.contains("permission"));

    h.chat.grant(GUILD, MODERATOR, Permission::BanMembers);
    moderation::dispatch_command(
        &h.warden,
        GUILD,
        REPLY_CHANNEL,
        MODERATOR,
        "modflags",
        &[USER.to_string(), "2".to_string()],
    )
    .await;
    assert_eq!(h.warden.ledger.total(GUILD, USER), 2);

    let replies = h.chat.sent_to(REPLY_CHANNEL);
    assert_eq!(replies.len(), 2);
    assert!(replies[1].1.contains("0 → 2"));
}
