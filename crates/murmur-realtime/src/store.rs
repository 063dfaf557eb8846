//! Bounded in-memory message history.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::message::{now_millis, Message, MessageDraft};

/// Append-only history of recent messages, emptied wholesale by the janitor.
#[derive(Debug, Default)]
pub struct MessageStore {
    inner: RwLock<StoreInner>,
    /// Maximum number of messages returned by a snapshot.
    replay_cap: Option<usize>,
}

#[derive(Debug, Default)]
struct StoreInner {
    messages: Vec<Arc<Message>>,
    last_timestamp: i64,
}

impl MessageStore {
    /// Create an empty store without a replay cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose snapshots hold at most `cap` messages.
    pub fn with_replay_cap(cap: Option<usize>) -> Self {
        Self {
            inner: RwLock::default(),
            replay_cap: cap,
        }
    }

    /// Stamp a draft and append it.
    pub fn append(&self, draft: MessageDraft) -> Arc<Message> {
        self.append_at(draft, now_millis())
    }

    /// Stamp a draft with `now` and append it.
    ///
    /// Timestamps never go backwards: a clock that stepped back is clamped to
    /// the previous timestamp.
    pub fn append_at(&self, draft: MessageDraft, now: i64) -> Arc<Message> {
        let mut inner = self.inner.write();
        let timestamp = now.max(inner.last_timestamp);
        inner.last_timestamp = timestamp;

        let message = Arc::new(draft.stamp(timestamp));
        inner.messages.push(message.clone());
        message
    }

    /// Point-in-time copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<Message>> {
        let inner = self.inner.read();
        let skip = match self.replay_cap {
            Some(cap) => inner.messages.len().saturating_sub(cap),
            None => 0,
        };
        inner.messages[skip..].to_vec()
    }

    /// Drop every message. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.write();
        let dropped = inner.messages.len();
        inner.messages.clear();
        dropped
    }

    /// Number of buffered messages.
    pub fn len(&self) -> usize {
        self.inner.read().messages.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().messages.is_empty()
    }

    /// The configured replay cap.
    pub fn replay_cap(&self) -> Option<usize> {
        self.replay_cap
    }
}
