//! This instance's outward feed.

use crate::error::{Result, StoreError};
use crate::messages::MessageStore;
use crate::types::{Feed, Message, MessageId};
use std::sync::Arc;

/// Serves public messages to other instances.
pub struct FeedPublisher {
    messages: Arc<MessageStore>,
}

impl FeedPublisher {
    pub fn new(messages: Arc<MessageStore>) -> Self {
        Self { messages }
    }

    /// Public messages in id order, skipping the first `offset` of them.
    /// Covers both authored and shared messages.
    pub fn recent(&self, offset: usize) -> Result<Vec<Message>> {
        Ok(self
            .messages
            .list_all(0)?
            .into_iter()
            .filter(Message::is_public)
            .skip(offset)
            .collect())
    }

    /// The `{ "posts": [...] }` document for [`recent`](Self::recent).
    pub fn recent_feed(&self, offset: usize) -> Result<Feed> {
        Ok(Feed {
            posts: self.recent(offset)?,
        })
    }

    /// [`recent_feed`](Self::recent_feed) encoded as JSON.
    pub fn recent_json(&self, offset: usize) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.recent_feed(offset)?)?)
    }

    /// A single public message.
    pub fn one(&self, id: MessageId) -> Result<Message> {
        let message = self.messages.get(id)?;
        if message.meta.is_private {
            return Err(StoreError::PrivateMessage(id));
        }
        Ok(message)
    }
}
