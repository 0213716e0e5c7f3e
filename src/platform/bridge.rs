//! Bridge implementation of [`ChatApi`].
//!
//! Each call becomes an [`Action`] request with a sequence number, shipped
//! to the attached connector; the matching [`Reply`] resolves a oneshot.
//! With no connector attached every call fails fast with
//! [`PlatformError::Disconnected`] - callers treat that like any other
//! transient platform failure.

use crate::error::PlatformError;
use crate::platform::ChatApi;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use sentinel_proto::{
    Action, ChannelId, GuildId, MessageId, MessageRef, Permission, PinnedMessage, Reply, ReplyData,
    RoleId, ServerFrame, Severity, UserId,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// How long to wait for the connector to answer a single request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Long-lived request broker between the core and the connector connection.
pub struct BridgeChat {
    outbound: RwLock<Option<(u64, mpsc::Sender<ServerFrame>)>>,
    pending: DashMap<u64, oneshot::Sender<Result<ReplyData, String>>>,
    seq: AtomicU64,
    generation: AtomicU64,
}

impl BridgeChat {
    pub fn new() -> Self {
        Self {
            outbound: RwLock::new(None),
            pending: DashMap::new(),
            seq: AtomicU64::new(1),
            generation: AtomicU64::new(0),
        }
    }

    /// Attach a freshly accepted connector connection, replacing any prior
    /// one. Returns a generation handle for the matching [`Self::detach`].
    pub fn attach(&self, tx: mpsc::Sender<ServerFrame>) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        *self.outbound.write() = Some((generation, tx));
        crate::metrics::set_connector_attached(true);
        generation
    }

    /// Detach on connector disconnect. A stale generation (already replaced
    /// by a newer connector) is a no-op. In-flight requests resolve with
    /// [`PlatformError::Disconnected`] as their oneshot senders drop.
    pub fn detach(&self, generation: u64) {
        let mut guard = self.outbound.write();
        if guard.as_ref().is_some_and(|(current, _)| *current == generation) {
            *guard = None;
            drop(guard);
            self.pending.clear();
            crate::metrics::set_connector_attached(false);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.outbound.read().is_some()
    }

    /// Resolve a reply frame from the connector.
    pub fn resolve(&self, reply: Reply) {
        match self.pending.remove(&reply.seq) {
            Some((_, tx)) => {
                let _ = tx.send(reply.result);
            }
            None => debug!(seq = reply.seq, "reply for unknown or timed-out request"),
        }
    }

    async fn request(&self, action: Action) -> Result<ReplyData, PlatformError> {
        let tx = self
            .outbound
            .read()
            .as_ref()
            .map(|(_, tx)| tx.clone())
            .ok_or(PlatformError::Disconnected)?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(seq, reply_tx);

        if tx.send(ServerFrame::Request { seq, action }).await.is_err() {
            self.pending.remove(&seq);
            return Err(PlatformError::Disconnected);
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, reply_rx).await {
            Err(_) => {
                self.pending.remove(&seq);
                warn!(seq, "connector request timed out");
                Err(PlatformError::Timeout)
            }
            Ok(Err(_)) => Err(PlatformError::Disconnected),
            Ok(Ok(Ok(data))) => Ok(data),
            Ok(Ok(Err(message))) => Err(PlatformError::Rejected(message)),
        }
    }

    async fn request_unit(&self, action: Action) -> Result<(), PlatformError> {
        match self.request(action).await? {
            ReplyData::Unit => Ok(()),
            _ => Err(PlatformError::UnexpectedReply),
        }
    }

    async fn request_message(&self, action: Action) -> Result<MessageRef, PlatformError> {
        match self.request(action).await? {
            ReplyData::Message { message } => Ok(message),
            _ => Err(PlatformError::UnexpectedReply),
        }
    }
}

impl Default for BridgeChat {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatApi for BridgeChat {
    async fn send_message(
        &self,
        channel: ChannelId,
        content: &str,
    ) -> Result<MessageRef, PlatformError> {
        self.request_message(Action::SendMessage {
            channel,
            content: content.to_string(),
        })
        .await
    }

    async fn send_dm(&self, user: UserId, content: &str) -> Result<MessageRef, PlatformError> {
        self.request_message(Action::SendDm {
            user,
            content: content.to_string(),
        })
        .await
    }

    async fn edit_message(
        &self,
        channel: ChannelId,
        message: MessageId,
        content: &str,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::EditMessage {
            channel,
            message,
            content: content.to_string(),
        })
        .await
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::DeleteMessage { channel, message })
            .await
    }

    async fn pin_message(
        &self,
        channel: ChannelId,
        message: MessageId,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::PinMessage { channel, message })
            .await
    }

    async fn list_pins(&self, channel: ChannelId) -> Result<Vec<PinnedMessage>, PlatformError> {
        match self.request(Action::ListPins { channel }).await? {
            ReplyData::Pins { pins } => Ok(pins),
            _ => Err(PlatformError::UnexpectedReply),
        }
    }

    async fn add_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::AddReaction {
            channel,
            message,
            emoji: emoji.to_string(),
        })
        .await
    }

    async fn timeout_member(
        &self,
        guild: GuildId,
        user: UserId,
        seconds: u64,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::TimeoutMember {
            guild,
            user,
            seconds,
            reason: reason.to_string(),
        })
        .await
    }

    async fn ban_member(
        &self,
        guild: GuildId,
        user: UserId,
        reason: &str,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::BanMember {
            guild,
            user,
            reason: reason.to_string(),
        })
        .await
    }

    async fn member_has(
        &self,
        guild: GuildId,
        user: UserId,
        permission: Permission,
    ) -> Result<bool, PlatformError> {
        match self
            .request(Action::HasPermission {
                guild,
                user,
                permission,
            })
            .await?
        {
            ReplyData::Bool { value } => Ok(value),
            _ => Err(PlatformError::UnexpectedReply),
        }
    }

    async fn add_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::AddRole { guild, user, role }).await
    }

    async fn remove_role(
        &self,
        guild: GuildId,
        user: UserId,
        role: RoleId,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::RemoveRole { guild, user, role })
            .await
    }

    async fn ensure_memory_channel(
        &self,
        guild: GuildId,
        name: &str,
    ) -> Result<ChannelId, PlatformError> {
        match self
            .request(Action::EnsureMemoryChannel {
                guild,
                name: name.to_string(),
            })
            .await?
        {
            ReplyData::Channel {
                channel: Some(channel),
            } => Ok(channel),
            ReplyData::Channel { channel: None } => Err(PlatformError::Rejected(
                "memory channel could not be created".to_string(),
            )),
            _ => Err(PlatformError::UnexpectedReply),
        }
    }

    async fn guild_log(
        &self,
        guild: GuildId,
        text: &str,
        severity: Severity,
        tag: &str,
    ) -> Result<(), PlatformError> {
        self.request_unit(Action::GuildLog {
            guild,
            text: text.to_string(),
            severity,
            tag: tag.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn detached_bridge_fails_fast() {
        let bridge = BridgeChat::new();
        let err = bridge
            .delete_message(ChannelId(1), MessageId(2))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Disconnected));
    }

    #[tokio::test]
    async fn reply_resolves_pending_request() {
        let bridge = std::sync::Arc::new(BridgeChat::new());
        let (tx, mut rx) = mpsc::channel(4);
        bridge.attach(tx);

        let responder = {
            let bridge = std::sync::Arc::clone(&bridge);
            tokio::spawn(async move {
                let ServerFrame::Request { seq, action } = rx.recv().await.unwrap();
                assert!(matches!(action, Action::SendDm { .. }));
                bridge.resolve(Reply {
                    seq,
                    result: Ok(ReplyData::Message {
                        message: MessageRef {
                            channel: ChannelId(9),
                            id: MessageId(10),
                        },
                    }),
                });
            })
        };

        let sent = bridge.send_dm(UserId(5), "hello").await.unwrap();
        assert_eq!(sent.id, MessageId(10));
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn rejected_reply_maps_to_rejection() {
        let bridge = std::sync::Arc::new(BridgeChat::new());
        let (tx, mut rx) = mpsc::channel(4);
        bridge.attach(tx);

        let responder = {
            let bridge = std::sync::Arc::clone(&bridge);
            tokio::spawn(async move {
                let ServerFrame::Request { seq, .. } = rx.recv().await.unwrap();
                bridge.resolve(Reply {
                    seq,
                    result: Err("no such channel".into()),
                });
            })
        };

        let err = bridge
            .send_message(ChannelId(1), "hi")
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        responder.await.unwrap();
    }

    #[tokio::test]
    async fn detach_clears_pending() {
        let bridge = BridgeChat::new();
        let (tx, _rx) = mpsc::channel(4);
        let generation = bridge.attach(tx);
        assert!(bridge.is_attached());
        bridge.detach(generation);
        assert!(!bridge.is_attached());
    }

    #[tokio::test]
    async fn stale_detach_does_not_clobber_replacement() {
        let bridge = BridgeChat::new();
        let (old_tx, _old_rx) = mpsc::channel(4);
        let old_generation = bridge.attach(old_tx);

        let (new_tx, _new_rx) = mpsc::channel(4);
        let _new_generation = bridge.attach(new_tx);

        // The replaced session tearing down must not detach the new one.
        bridge.detach(old_generation);
        assert!(bridge.is_attached());
    }
}
