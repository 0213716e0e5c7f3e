//! Appeal records and their durable store.
//!
//! One [`Appeal`] per warning DM, keyed by the DM's message id. Status
//! transitions follow a DAG and terminal records are never mutated again.
//! Unlike flag counters, every mutation is written to disk immediately:
//! appeals are low-frequency and disputes demand durability.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sentinel_proto::{GuildId, MessageId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::warn;

/// Where an appeal is in its lifecycle.
///
/// `Warned -> Appealed -> {Accepted | Rejected | TimedOut}`, or
/// `Warned -> TimedOut` when the window elapses unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealStatus {
    Warned,
    Appealed,
    Accepted,
    Rejected,
    TimedOut,
}

impl AppealStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected | Self::TimedOut)
    }
}

/// One user's dispute of one warning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub warn_time: DateTime<Utc>,
    /// The offending message text.
    pub context: String,
    /// The matched blocklist keyword.
    pub reason: String,
    pub status: AppealStatus,
    /// The moderator-facing review post, once one exists.
    pub review_msg_id: Option<MessageId>,
    /// Time of entering `Appealed`, then of final resolution.
    pub review_time: Option<DateTime<Utc>>,
    pub review_by: Option<UserId>,
}

impl Appeal {
    /// A fresh record in the `Warned` state.
    pub fn warned(
        user_id: UserId,
        guild_id: GuildId,
        context: String,
        reason: String,
        warn_time: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            guild_id,
            warn_time,
            context,
            reason,
            status: AppealStatus::Warned,
            review_msg_id: None,
            review_time: None,
            review_by: None,
        }
    }
}

/// The process-wide appeal table with its JSON file mirror.
pub struct AppealStore {
    path: PathBuf,
    appeals: DashMap<MessageId, Appeal>,
    /// review post id -> warning DM id, so unrelated reactions cost one
    /// lookup.
    by_review: DashMap<MessageId, MessageId>,
}

impl AppealStore {
    /// Load the store from disk. A missing file is an empty store; a
    /// corrupt file is logged and treated as empty.
    pub fn load(path: PathBuf) -> Self {
        let store = Self {
            path,
            appeals: DashMap::new(),
            by_review: DashMap::new(),
        };

        let raw = match std::fs::read_to_string(&store.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return store,
            Err(err) => {
                warn!(error = %err, path = %store.path.display(), "failed to read appeal store");
                return store;
            }
        };

        match serde_json::from_str::<BTreeMap<String, Appeal>>(&raw) {
            Ok(parsed) => {
                for (key, appeal) in parsed {
                    let Ok(dm_id) = key.parse::<MessageId>() else {
                        warn!(key, "skipping appeal with malformed key");
                        continue;
                    };
                    if let Some(review) = appeal.review_msg_id {
                        store.by_review.insert(review, dm_id);
                    }
                    store.appeals.insert(dm_id, appeal);
                }
            }
            Err(err) => {
                warn!(error = %err, path = %store.path.display(), "failed to parse appeal store");
            }
        }
        store
    }

    /// Number of tracked appeals.
    pub fn len(&self) -> usize {
        self.appeals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appeals.is_empty()
    }

    /// Register a new appeal and persist.
    pub fn insert(&self, dm_id: MessageId, appeal: Appeal) {
        if let Some(review) = appeal.review_msg_id {
            self.by_review.insert(review, dm_id);
        }
        self.appeals.insert(dm_id, appeal);
        self.save();
    }

    pub fn get(&self, dm_id: MessageId) -> Option<Appeal> {
        self.appeals.get(&dm_id).map(|entry| entry.clone())
    }

    /// Resolve a review post back to its warning DM.
    pub fn lookup_review(&self, review_msg: MessageId) -> Option<MessageId> {
        self.by_review.get(&review_msg).map(|entry| *entry)
    }

    /// Apply a transition iff the record is currently in `from`. The check
    /// and mutation happen under the entry lock, so of two racing
    /// moderators only the first wins. Persists and returns the updated
    /// record on success.
    pub fn try_transition(
        &self,
        dm_id: MessageId,
        from: AppealStatus,
        mutate: impl FnOnce(&mut Appeal),
    ) -> Option<Appeal> {
        let updated = {
            let mut entry = self.appeals.get_mut(&dm_id)?;
            if entry.status != from {
                return None;
            }
            mutate(&mut entry);
            if let Some(review) = entry.review_msg_id {
                self.by_review.insert(review, dm_id);
            }
            entry.clone()
        };
        self.save();
        Some(updated)
    }

    /// Appealed records whose review window has elapsed.
    pub fn expired_appealed(
        &self,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Vec<(MessageId, Appeal)> {
        self.appeals
            .iter()
            .filter(|entry| entry.status == AppealStatus::Appealed)
            .filter(|entry| {
                entry
                    .review_time
                    .is_some_and(|review_time| now - review_time > window)
            })
            .map(|entry| (*entry.key(), entry.clone()))
            .collect()
    }

    /// Write the whole table to disk. Best-effort: failures are logged and
    /// retried implicitly on the next mutation.
    pub fn save(&self) {
        let snapshot: BTreeMap<String, Appeal> = self
            .appeals
            .iter()
            .map(|entry| (entry.key().to_string(), entry.clone()))
            .collect();

        let rendered = match serde_json::to_string_pretty(&snapshot) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(error = %err, "failed to serialize appeal store");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(error = %err, "failed to create appeal store directory");
                return;
            }
        }
        if let Err(err) = std::fs::write(&self.path, rendered) {
            warn!(error = %err, path = %self.path.display(), "failed to write appeal store");
        }
    }
}
