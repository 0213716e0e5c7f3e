//! Integration test common infrastructure.
//!
//! Provides an in-memory [`chat::MockChat`] platform double and a harness
//! that wires it into a [`Warden`] with a temporary data directory.

#![allow(dead_code)]

pub mod chat;

pub use chat::MockChat;

use sentinel_proto::{ChannelId, GuildId, MessageEvent, MessageId, ReactionEvent, UserId};
use sentineld::config::Config;
use sentineld::state::{Warden, WardenParams};
use std::sync::Arc;

/// A guild message event for the violation pipeline.
pub fn guild_message(guild: u64, channel: u64, id: u64, author: u64, content: &str) -> MessageEvent {
    MessageEvent {
        guild: Some(GuildId(guild)),
        channel: ChannelId(channel),
        id: MessageId(id),
        author: UserId(author),
        author_is_bot: false,
        content: content.to_string(),
    }
}

/// A reaction on a warning DM (no guild).
pub fn dm_reaction(user: UserId, message: MessageId, emoji: &str) -> ReactionEvent {
    ReactionEvent {
        guild: None,
        channel: MockChat::dm_channel(user),
        message,
        user,
        emoji: emoji.to_string(),
    }
}

/// A reaction on a guild message (review posts).
pub fn guild_reaction(guild: u64, channel: ChannelId, message: MessageId, user: u64, emoji: &str) -> ReactionEvent {
    ReactionEvent {
        guild: Some(GuildId(guild)),
        channel,
        message,
        user: UserId(user),
        emoji: emoji.to_string(),
    }
}

/// A Warden wired to a MockChat over a temporary data directory.
pub struct Harness {
    pub warden: Arc<Warden>,
    pub chat: Arc<MockChat>,
    pub dir: tempfile::TempDir,
}

/// Build a harness with the default test configuration: blocklist
/// containing `foo` and `bar`, a review channel, leveling and watchdog off.
pub fn harness() -> Harness {
    harness_with(|_| {})
}

/// Build a harness, letting the caller tweak the configuration first.
pub fn harness_with(tweak: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");

    let blocklist = dir.path().join("banned-keywords.config");
    std::fs::write(&blocklist, "# test blocklist\nfoo\nbar\n").expect("write blocklist");

    let mut config = Config::default();
    config.daemon.data_dir = dir.path().join("data");
    config.daemon.metrics_port = 0;
    config.moderation.blocklist_path = blocklist;
    config.moderation.review_channel = Some(chat::REVIEW_CHANNEL);
    config.leveling.enabled = false;
    config.watchdog.enabled = false;
    tweak(&mut config);

    let chat = Arc::new(MockChat::new());
    let warden = Warden::new(WardenParams {
        config,
        chat: chat.clone(),
    });

    Harness { warden, chat, dir }
}
