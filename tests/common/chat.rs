//! In-memory [`ChatApi`] double.
//!
//! Records every side effect for assertions and keeps a working model of
//! channels, messages and pins so the persistence paths behave like the
//! real platform (stale handles fail, pins survive re-scans).

use async_trait::async_trait;
use parking_lot::Mutex;
use sentinel_proto::{
    ChannelId, GuildId, MessageId, MessageRef, Permission, PinnedMessage, RoleId, Severity, UserId,
};
use sentineld::error::PlatformError;
use sentineld::platform::ChatApi;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

/// The review channel used by the default harness config.
pub const REVIEW_CHANNEL: ChannelId = ChannelId(500);

/// DM channels are derived from the user id with this offset.
const DM_CHANNEL_BASE: u64 = 1_000_000_000;

/// One recorded platform side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Sent {
        channel: ChannelId,
        id: MessageId,
        content: String,
    },
    Dm {
        user: UserId,
        id: MessageId,
        content: String,
    },
    Deleted {
        channel: ChannelId,
        message: MessageId,
    },
    Reacted {
        channel: ChannelId,
        message: MessageId,
        emoji: String,
    },
    Timeout {
        guild: GuildId,
        user: UserId,
        seconds: u64,
    },
    Banned {
        guild: GuildId,
        user: UserId,
        reason: String,
    },
    RoleAdded {
        guild: GuildId,
        user: UserId,
        role: RoleId,
    },
    RoleRemoved {
        guild: GuildId,
        user: UserId,
        role: RoleId,
    },
    Logged {
        guild: GuildId,
        severity: Severity,
        tag: String,
        text: String,
    },
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    /// Content of every live message, keyed by (channel, id).
    messages: HashMap<(ChannelId, MessageId), String>,
    /// Pinned message ids per channel, in pin order.
    pins: HashMap<ChannelId, Vec<MessageId>>,
    memory_channels: HashMap<(GuildId, String), ChannelId>,
    permissions: HashSet<(GuildId, UserId, Permission)>,
    /// Operations forced to fail with `Rejected`.
    failing: HashSet<&'static str>,
}

pub struct MockChat {
    inner: Mutex<Inner>,
    next_id: AtomicU64,
    next_channel: AtomicU64,
}

impl MockChat {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            next_id: AtomicU64::new(1),
            next_channel: AtomicU64::new(9000),
        }
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn check(&self, op: &'static str) -> Result<(), PlatformError> {
        if self.inner.lock().failing.contains(op) {
            return Err(PlatformError::Rejected(format!("{op} forced to fail")));
        }
        Ok(())
    }

    /// The DM channel this mock assigns to a user.
    pub fn dm_channel(user: UserId) -> ChannelId {
        ChannelId(DM_CHANNEL_BASE + user.0)
    }

    // === test controls ===

    pub fn grant(&self, guild: GuildId, user: UserId, permission: Permission) {
        self.inner.lock().permissions.insert((guild, user, permission));
    }

    pub fn fail_op(&self, op: &'static str) {
        self.inner.lock().failing.insert(op);
    }

    pub fn restore_op(&self, op: &'static str) {
        self.inner.lock().failing.remove(op);
    }

    /// Plant a pinned message directly (for load-path tests).
    pub fn plant_pin(&self, channel: ChannelId, content: &str) -> MessageId {
        let id = self.next_message_id();
        let mut inner = self.inner.lock();
        inner.messages.insert((channel, id), content.to_string());
        inner.pins.entry(channel).or_default().push(id);
        id
    }

    /// Remove a message entirely, pin included (simulates deletion by a
    /// third party; subsequent edits of the handle fail).
    pub fn vaporize(&self, channel: ChannelId, message: MessageId) {
        let mut inner = self.inner.lock();
        inner.messages.remove(&(channel, message));
        if let Some(pins) = inner.pins.get_mut(&channel) {
            pins.retain(|id| *id != message);
        }
    }

    // === recorded-state accessors ===

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    pub fn dms_to(&self, user: UserId) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Dm { user: u, content, .. } if *u == user => Some(content.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_dm_id(&self, user: UserId) -> Option<MessageId> {
        self.inner
            .lock()
            .calls
            .iter()
            .rev()
            .find_map(|call| match call {
                Call::Dm { user: u, id, .. } if *u == user => Some(*id),
                _ => None,
            })
    }

    pub fn timeout_count(&self, guild: GuildId, user: UserId) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| {
                matches!(call, Call::Timeout { guild: g, user: u, .. } if *g == guild && *u == user)
            })
            .count()
    }

    pub fn bans(&self, guild: GuildId) -> Vec<UserId> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Banned { guild: g, user, .. } if *g == guild => Some(*user),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self, channel: ChannelId, message: MessageId) -> bool {
        self.inner
            .lock()
            .calls
            .iter()
            .any(|call| matches!(call, Call::Deleted { channel: c, message: m } if *c == channel && *m == message))
    }

    pub fn reactions_on(&self, channel: ChannelId, message: MessageId) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Reacted { channel: c, message: m, emoji } if *c == channel && *m == message => {
                    Some(emoji.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Messages sent into a channel, oldest first.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<(MessageId, String)> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Sent { channel: c, id, content } if *c == channel => {
                    Some((*id, content.clone()))
                }
                _ => None,
            })
            .collect()
    }

    /// Current pins (id + live content) in a channel.
    pub fn pins_in(&self, channel: ChannelId) -> Vec<PinnedMessage> {
        let inner = self.inner.lock();
        inner
            .pins
            .get(&channel)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| {
                        inner.messages.get(&(channel, *id)).map(|content| PinnedMessage {
                            id: *id,
                            content: content.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The memory channel the mock handed out for a guild, if any.
    pub fn memory_channel_of(&self, guild: GuildId, name: &str) -> Option<ChannelId> {
        self.inner
            .lock()
            .memory_channels
            .get(&(guild, name.to_string()))
            .copied()
    }
}

impl Default for MockChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatApi for MockChat {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageRef, PlatformError> {
        self.check("send_message")?;
        let id = self.next_message_id();
        let mut inner = self.inner.lock();
        inner.messages.insert((channel, id), content.to_string());
        inner.calls.push(Call::Sent {
            channel,
            id,
            content: content.to_string(),
        });
        Ok(MessageRef { channel, id })
    }

    async fn send_dm(&self, user: UserId, content: &str) -> Result<MessageRef, PlatformError> {
        self.check("send_dm")?;
        let channel = Self::dm_channel(user);
        let id = self.next_message_id();
        let mut inner = self.inner.lock();
        inner.messages.insert((channel, id), content.to_string());
        inner.calls.push(Call::Dm {
            user,
            id,
            content: content.to_string(),
        });
        Ok(MessageRef { channel, id })
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), PlatformError> {
        self.check("edit_message")?;
        let mut inner = self.inner.lock();
        match inner.messages.get_mut(&(channel, message)) {
            Some(existing) => {
                *existing = content.to_string();
                Ok(())
            }
            None => Err(PlatformError::Rejected("unknown message".to_string())),
        }
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.check("delete_message")?;
        let mut inner = self.inner.lock();
        inner.messages.remove(&(channel, message));
        inner.calls.push(Call::Deleted { channel, message });
        Ok(())
    }

    async fn pin_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.check("pin_message")?;
        let mut inner = self.inner.lock();
        if !inner.messages.contains_key(&(channel, message)) {
            return Err(PlatformError::Rejected("unknown message".to_string()));
        }
        let pins = inner.pins.entry(channel).or_default();
        if !pins.contains(&message) {
            pins.push(message);
        }
        Ok(())
    }

    async fn list_pins(&self, channel: ChannelId) -> Result<Vec<PinnedMessage>, PlatformError> {
        self.check("list_pins")?;
        Ok(self.pins_in(channel))
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        self.check("add_reaction")?;
        self.inner.lock().calls.push(Call::Reacted {
            channel,
            message,
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild: GuildId,
        user: UserId,
        seconds: u64,
        _reason: &str,
    ) -> Result<(), PlatformError> {
        self.check("timeout_member")?;
        self.inner.lock().calls.push(Call::Timeout {
            guild,
            user,
            seconds,
        });
        Ok(())
    }

    async fn ban_member(
        &self,
        guild: GuildId,
        user: UserId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.check("ban_member")?;
        self.inner.lock().calls.push(Call::Banned {
            guild,
            user,
            reason: reason.to_string(),
        });
        Ok(())
    }

    async fn member_has(
        &self,
        guild: GuildId,
        user: UserId,
        permission: Permission,
    ) -> Result<bool, PlatformError> {
        self.check("member_has")?;
        Ok(self.inner.lock().permissions.contains(&(guild, user, permission)))
    }

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError> {
        self.check("add_role")?;
        self.inner.lock().calls.push(Call::RoleAdded { guild, user, role });
        Ok(())
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError> {
        self.check("remove_role")?;
        self.inner
            .lock()
            .calls
            .push(Call::RoleRemoved { guild, user, role });
        Ok(())
    }

    async fn ensure_memory_channel(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<ChannelId, PlatformError> {
        self.check("ensure_memory_channel")?;
        let mut inner = self.inner.lock();
        let channel = *inner
            .memory_channels
            .entry((guild, name.to_string()))
            .or_insert_with(|| ChannelId(self.next_channel.fetch_add(1, Ordering::Relaxed)));
        Ok(channel)
    }

    async fn guild_log(
        &self,
        guild: GuildId,
        text: &str,
        severity: Severity,
        tag: &str,
    ) -> Result<(), PlatformError> {
        self.check("guild_log")?;
        self.inner.lock().calls.push(Call::Logged {
            guild,
            severity,
            tag: tag.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}
