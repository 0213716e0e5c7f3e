//! Connector -> daemon events.

use crate::ids::{ChannelId, GuildId, MessageId, UserId};
use serde::{Deserialize, Serialize};

/// A notification from the connector about something that happened on the
/// platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// First frame after connecting. Carries the optional shared token and
    /// the guilds the connector currently serves.
    Hello {
        connector: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        guilds: Vec<GuildId>,
    },
    /// A guild became available after the initial hello (joined, outage
    /// recovered). Triggers state rehydration for that guild.
    GuildAvailable { guild: GuildId },
    /// A new message was posted.
    Message { message: MessageEvent },
    /// An existing message was edited. `before` is the prior content when
    /// the connector still has it cached.
    MessageEdit {
        message: MessageEvent,
        #[serde(default)]
        before: Option<String>,
    },
    /// A reaction was added to a message.
    ReactionAdd { reaction: ReactionEvent },
    /// A moderator invoked a command. The daemon answers into `channel`.
    Command {
        guild: GuildId,
        channel: ChannelId,
        invoker: UserId,
        name: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

/// A chat message as delivered by the connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    /// `None` for direct messages.
    pub guild: Option<GuildId>,
    pub channel: ChannelId,
    pub id: MessageId,
    pub author: UserId,
    #[serde(default)]
    pub author_is_bot: bool,
    pub content: String,
}

/// A reaction added to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// `None` when the reaction happened in a DM channel.
    pub guild: Option<GuildId>,
    pub channel: ChannelId,
    pub message: MessageId,
    pub user: UserId,
    pub emoji: String,
}
