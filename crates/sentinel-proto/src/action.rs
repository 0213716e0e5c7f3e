//! Daemon -> connector requests and their replies.

use crate::ids::{ChannelId, GuildId, MessageId, RoleId, UserId};
use crate::{Permission, Severity};
use serde::{Deserialize, Serialize};

/// A platform operation the daemon asks the connector to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    SendMessage {
        channel: ChannelId,
        content: String,
    },
    /// Open (or reuse) a DM channel with the user and send into it.
    SendDm {
        user: UserId,
        content: String,
    },
    EditMessage {
        channel: ChannelId,
        message: MessageId,
        content: String,
    },
    DeleteMessage {
        channel: ChannelId,
        message: MessageId,
    },
    PinMessage {
        channel: ChannelId,
        message: MessageId,
    },
    ListPins {
        channel: ChannelId,
    },
    AddReaction {
        channel: ChannelId,
        message: MessageId,
        emoji: String,
    },
    /// Apply a timed communication restriction.
    TimeoutMember {
        guild: GuildId,
        user: UserId,
        seconds: u64,
        reason: String,
    },
    BanMember {
        guild: GuildId,
        user: UserId,
        reason: String,
    },
    AddRole {
        guild: GuildId,
        user: UserId,
        role: RoleId,
    },
    RemoveRole {
        guild: GuildId,
        user: UserId,
        role: RoleId,
    },
    HasPermission {
        guild: GuildId,
        user: UserId,
        permission: Permission,
    },
    /// Find the named private memory channel, creating it (hidden from the
    /// default role) when absent.
    EnsureMemoryChannel {
        guild: GuildId,
        name: String,
    },
    /// Emit a line into the guild's moderation log channel. The connector
    /// resolves the channel and renders the severity as a color.
    GuildLog {
        guild: GuildId,
        text: String,
        severity: Severity,
        tag: String,
    },
}

/// A message the daemon created, with enough context to react to it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub channel: ChannelId,
    pub id: MessageId,
}

/// One pinned message in a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinnedMessage {
    pub id: MessageId,
    pub content: String,
}

/// Successful reply payloads, one variant per action family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplyData {
    Unit,
    Message { message: MessageRef },
    Pins { pins: Vec<PinnedMessage> },
    Channel { channel: Option<ChannelId> },
    Bool { value: bool },
}

/// The connector's answer to a [`ServerFrame::Request`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub seq: u64,
    pub result: Result<ReplyData, String>,
}

/// Frames flowing connector -> daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ClientFrame {
    Event { event: crate::Event },
    Reply { reply: Reply },
}

/// Frames flowing daemon -> connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ServerFrame {
    Request { seq: u64, action: Action },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_round_trips() {
        let frame = ServerFrame::Request {
            seq: 7,
            action: Action::DeleteMessage {
                channel: ChannelId(10),
                message: MessageId(20),
            },
        };
        let line = serde_json::to_string(&frame).unwrap();
        assert!(line.contains("\"op\":\"delete_message\""));
        let back: ServerFrame = serde_json::from_str(&line).unwrap();
        let ServerFrame::Request { seq, .. } = back;
        assert_eq!(seq, 7);
    }

    #[test]
    fn error_reply_round_trips() {
        let reply = Reply {
            seq: 3,
            result: Err("missing permissions".into()),
        };
        let line = serde_json::to_string(&ClientFrame::Reply { reply }).unwrap();
        let back: ClientFrame = serde_json::from_str(&line).unwrap();
        match back {
            ClientFrame::Reply { reply } => {
                assert_eq!(reply.seq, 3);
                assert_eq!(reply.result.unwrap_err(), "missing permissions");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn pins_reply_carries_content() {
        let data = ReplyData::Pins {
            pins: vec![PinnedMessage {
                id: MessageId(1),
                content: "[FLAGS]\n42:3".into(),
            }],
        };
        let line = serde_json::to_string(&data).unwrap();
        let back: ReplyData = serde_json::from_str(&line).unwrap();
        match back {
            ReplyData::Pins { pins } => assert_eq!(pins[0].content, "[FLAGS]\n42:3"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
