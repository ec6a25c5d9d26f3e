//! Turns external messages into local shares.

use super::ShareKey;
use crate::error::{Result, StoreError};
use crate::messages::MessageStore;
use crate::types::{DraftContent, ExternalMessage, Message, MessageDraft, Meta};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Records shares through the message store, refusing duplicates.
pub struct SharingEngine {
    messages: Arc<MessageStore>,

    /// Serializes the duplicate check with the write that follows it.
    share_lock: Mutex<()>,
}

impl SharingEngine {
    pub fn new(messages: Arc<MessageStore>) -> Self {
        Self {
            messages,
            share_lock: Mutex::new(()),
        }
    }

    /// Store a local copy of `external`, pulled from `source_url`.
    ///
    /// Fails with [`StoreError::DuplicateShare`] and writes nothing if the same
    /// remote message was already shared from `source_url`.
    pub fn share(&self, external: &ExternalMessage, source_url: &str) -> Result<Message> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(StoreError::Validation("share source url is required".into()));
        }
        if external.meta.origin_url.trim().is_empty() {
            return Err(StoreError::Validation(
                "shared message has no originUrl".into(),
            ));
        }

        let _guard = self.share_lock.lock();

        let key = ShareKey::new(
            external.meta.origin_url.as_str(),
            source_url,
            external.id,
        );
        if let Some(existing) = self.messages.find_share(&key) {
            debug!(
                origin = %key.origin_url,
                source = source_url,
                existing = existing.0,
                "Skipping duplicate share"
            );
            return Err(StoreError::DuplicateShare {
                origin_url: key.origin_url,
                source_url: key.source_url,
                existing,
            });
        }

        let draft = MessageDraft {
            content: DraftContent {
                message: external.content.message.clone(),
                urls: external.content.urls.clone(),
            },
            meta: Meta {
                origin_url: external.meta.origin_url.clone(),
                location: external.meta.location.clone(),
                is_private: false,
                is_shared: true,
                remote_id: external.id,
            },
        };

        self.messages
            .create_with_shares(draft, vec![source_url.to_string()])
    }
}
