//! sentinel-proto - wire protocol for the sentineld connector bridge.
//!
//! The daemon owns moderation state; a platform connector process owns the
//! actual chat-platform session. The two talk newline-delimited JSON over a
//! socket. This crate defines the shared vocabulary:
//!
//! - [`ids`]: typed snowflake-style identifiers
//! - [`event`]: connector -> daemon notifications (messages, reactions)
//! - [`action`]: daemon -> connector requests and their replies
//!
//! Framing is one JSON document per line. Requests carry a sequence number;
//! the connector answers each request with a [`action::Reply`] echoing it.

pub mod action;
pub mod event;
pub mod ids;

pub use action::{Action, ClientFrame, MessageRef, PinnedMessage, Reply, ReplyData, ServerFrame};
pub use event::{Event, MessageEvent, ReactionEvent};
pub use ids::{ChannelId, GuildId, MessageId, RoleId, UserId};

use serde::{Deserialize, Serialize};

/// Guild-level permissions the daemon cares about.
///
/// The connector maps these onto whatever the concrete platform calls them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Full administrative rights; used for the moderation filter bypass.
    Administrator,
    /// Ban authority; gates appeal review and lockdown confirm/revoke.
    BanMembers,
    /// Timed-restriction authority.
    ModerateMembers,
}

/// Severity of a guild log line, rendered as a color by the connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}
