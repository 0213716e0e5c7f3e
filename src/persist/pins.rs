//! Pinned-message persistence surface.
//!
//! Each guild gets a private memory channel holding at most one pinned
//! message per data kind. The message body is the kind tag on the first
//! line, counter lines after. Saves edit the cached message handle in
//! place; a stale handle (message deleted, pin removed) falls back to a
//! re-scan of current pins before a brand-new message is sent and pinned.

use crate::error::PlatformError;
use crate::platform::ChatApi;
use dashmap::DashMap;
use sentinel_proto::{ChannelId, GuildId, MessageId};
use std::sync::Arc;
use tracing::{debug, warn};

/// The data kinds mirrored into pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinKind {
    Flags,
    Xp,
}

impl PinKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Flags => "[FLAGS]",
            Self::Xp => "[XP]",
        }
    }
}

/// Extract the body of a pin carrying the given kind, if it does.
pub fn strip_tag(content: &str, kind: PinKind) -> Option<&str> {
    content.strip_prefix(kind.tag())?.strip_prefix('\n')
}

/// Remote persistence via per-guild memory-channel pins.
pub struct PinStore {
    chat: Arc<dyn ChatApi>,
    channel_name: String,
    channels: DashMap<GuildId, ChannelId>,
    messages: DashMap<(GuildId, PinKind), MessageId>,
}

impl PinStore {
    pub fn new(chat: Arc<dyn ChatApi>, channel_name: String) -> Self {
        Self {
            chat,
            channel_name,
            channels: DashMap::new(),
            messages: DashMap::new(),
        }
    }

    async fn memory_channel(&self, guild: GuildId) -> Result<ChannelId, PlatformError> {
        if let Some(channel) = self.channels.get(&guild) {
            return Ok(*channel);
        }
        let channel = self
            .chat
            .ensure_memory_channel(guild, &self.channel_name)
            .await?;
        self.channels.insert(guild, channel);
        Ok(channel)
    }

    /// Read the body of the guild's pin for `kind`. `Ok(None)` when no such
    /// pin exists. Caches the message handle for later in-place edits.
    pub async fn load(
        &self,
        guild: GuildId,
        kind: PinKind,
    ) -> Result<Option<String>, PlatformError> {
        let channel = self.memory_channel(guild).await?;
        let pins = self.chat.list_pins(channel).await?;
        for pin in pins {
            if let Some(body) = strip_tag(&pin.content, kind) {
                self.messages.insert((guild, kind), pin.id);
                return Ok(Some(body.to_string()));
            }
        }
        Ok(None)
    }

    /// Write `body` as the guild's pin for `kind`, editing in place when
    /// possible.
    pub async fn save(&self, guild: GuildId, kind: PinKind, body: &str) -> Result<(), PlatformError> {
        let channel = self.memory_channel(guild).await?;
        let content = format!("{}\n{}", kind.tag(), body);

        // Fast path: edit the cached handle.
        if let Some(cached) = self.messages.get(&(guild, kind)).map(|entry| *entry) {
            match self.chat.edit_message(channel, cached, &content).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!(%guild, kind = kind.tag(), error = %err, "cached pin handle stale, re-scanning");
                    self.messages.remove(&(guild, kind));
                }
            }
        }

        // The handle was stale or never cached: locate an existing pin.
        match self.chat.list_pins(channel).await {
            Ok(pins) => {
                for pin in pins {
                    if strip_tag(&pin.content, kind).is_some() {
                        match self.chat.edit_message(channel, pin.id, &content).await {
                            Ok(()) => {
                                self.messages.insert((guild, kind), pin.id);
                                return Ok(());
                            }
                            Err(err) => {
                                warn!(%guild, kind = kind.tag(), error = %err, "failed to edit located pin");
                            }
                        }
                    }
                }
            }
            Err(err) => {
                warn!(%guild, kind = kind.tag(), error = %err, "failed to list pins");
            }
        }

        // Last resort: a brand-new pinned message.
        let sent = self.chat.send_message(channel, &content).await?;
        self.chat.pin_message(channel, sent.id).await?;
        self.messages.insert((guild, kind), sent.id);
        Ok(())
    }

    /// Drop cached handles for a guild (used when the guild goes away).
    #[allow(dead_code)]
    pub fn forget(&self, guild: GuildId) {
        self.channels.remove(&guild);
        self.messages.retain(|(g, _), _| *g != guild);
    }
}
