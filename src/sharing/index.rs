//! Index of recorded shares for duplicate detection.

use crate::types::{Message, MessageId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Identity of one share: which remote message, pulled from which feed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShareKey {
    pub origin_url: String,
    pub source_url: String,
    /// Remote id, when the feed published one.
    pub remote_id: Option<MessageId>,
}

impl ShareKey {
    pub fn new(
        origin_url: impl Into<String>,
        source_url: impl Into<String>,
        remote_id: Option<MessageId>,
    ) -> Self {
        Self {
            origin_url: origin_url.into(),
            source_url: source_url.into(),
            remote_id,
        }
    }

    /// Every key a stored message occupies (one per entry in `shares`).
    pub fn keys_for(message: &Message) -> impl Iterator<Item = ShareKey> + '_ {
        message.shares.iter().map(move |source_url| {
            ShareKey::new(
                message.meta.origin_url.clone(),
                source_url.clone(),
                message.meta.remote_id,
            )
        })
    }
}

/// Maps share keys to the local message holding them.
#[derive(Default)]
pub struct ShareIndex {
    entries: RwLock<HashMap<ShareKey, MessageId>>,
}

impl ShareIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every key of `message`. Existing owners of a key are kept.
    pub fn add(&self, message: &Message) {
        let mut entries = self.entries.write();
        for key in ShareKey::keys_for(message) {
            entries.entry(key).or_insert(message.id);
        }
    }

    /// Drop the keys owned by `message`.
    pub fn remove(&self, message: &Message) {
        let mut entries = self.entries.write();
        for key in ShareKey::keys_for(message) {
            if entries.get(&key) == Some(&message.id) {
                entries.remove(&key);
            }
        }
    }

    /// Local message already holding `key`, if any.
    pub fn lookup(&self, key: &ShareKey) -> Option<MessageId> {
        self.entries.read().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
