//! Chat platform seam.
//!
//! The moderation core never talks to a concrete chat platform. It is
//! written against [`ChatApi`]; the production implementation is
//! [`bridge::BridgeChat`] (requests forwarded to the connector process), and
//! tests inject an in-memory double.

pub mod bridge;

use crate::error::PlatformError;
use async_trait::async_trait;
use sentinel_proto::{
    ChannelId, GuildId, MessageId, MessageRef, Permission, PinnedMessage, RoleId, Severity, UserId,
};
use std::sync::Arc;
use tracing::debug;

/// Platform operations the moderation core depends on.
///
/// Every method is best-effort from the caller's point of view: a
/// [`PlatformError`] means "this side effect did not happen this cycle" and
/// must never propagate out of a handler.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageRef, PlatformError>;

    /// Open (or reuse) a DM channel with the user and send into it.
    async fn send_dm(&self, user: UserId, content: &str) -> Result<MessageRef, PlatformError>;

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), PlatformError>;

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError>;

    async fn pin_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError>;

    async fn list_pins(&self, channel: ChannelId) -> Result<Vec<PinnedMessage>, PlatformError>;

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError>;

    /// Apply a timed communication restriction.
    async fn timeout_member(
        &self,
        guild: GuildId,
        user: UserId,
        seconds: u64,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn ban_member(
        &self,
        guild: GuildId,
        user: UserId,
        reason: &str,
    ) -> Result<(), PlatformError>;

    async fn member_has(
        &self,
        guild: GuildId,
        user: UserId,
        permission: Permission,
    ) -> Result<bool, PlatformError>;

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError>;

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError>;

    /// Find the named private memory channel, creating it when absent.
    async fn ensure_memory_channel(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<ChannelId, PlatformError>;

    /// Emit a line into the guild's moderation log channel.
    async fn guild_log(
        &self,
        guild: GuildId,
        text: &str,
        severity: Severity,
        tag: &str,
    ) -> Result<(), PlatformError>;
}

/// Fire-and-forget guild log line.
///
/// Spawned so callers never wait on (or fail because of) the log channel.
pub fn log_to_channel(
    chat: &Arc<dyn ChatApi>,
    guild: GuildId,
    text: String,
    severity: Severity,
    tag: &'static str,
) {
    let chat = Arc::clone(chat);
    tokio::spawn(async move {
        if let Err(err) = chat.guild_log(guild, &text, severity, tag).await {
            debug!(%guild, tag, error = %err, "guild log line dropped");
        }
    });
}
