//! Message store: id assignment, validation and versioning on top of a backend.

use crate::config::OwnerIdentity;
use crate::error::{Result, StoreError};
use crate::sharing::{ShareIndex, ShareKey};
use crate::storage::{Backend, MemoryBackend};
use crate::types::{Content, Message, MessageDraft, MessageId, Timestamp};
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tracing::debug;

/// Default number of decoded messages kept in memory.
const DEFAULT_CACHE_SIZE: usize = 256;

/// Owns the message records of one instance.
///
/// Every write goes through `writer`, which also holds the next id to
/// assign, so id assignment and the backend write form one critical section.
pub struct MessageStore {
    /// Serialized messages keyed by id.
    backend: Box<dyn Backend>,

    /// Author stamped on new messages.
    identity: RwLock<OwnerIdentity>,

    /// Next id to assign. Locked for the duration of every write.
    writer: Mutex<MessageId>,

    /// Recently decoded messages.
    cache: Mutex<LruCache<MessageId, Message>>,

    /// (origin, source, remote id) → message, for duplicate share checks.
    shares: ShareIndex,
}

impl MessageStore {
    /// Open a store over `backend`, rebuilding the share index from its contents.
    pub fn open(
        backend: Box<dyn Backend>,
        identity: OwnerIdentity,
        cache_size: usize,
    ) -> Result<Self> {
        let shares = ShareIndex::new();
        for (_, bytes) in backend.scan()? {
            shares.add(&decode(&bytes)?);
        }

        let next_id = backend.high_water_mark().next();
        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);

        debug!(messages = backend.len(), next_id = next_id.0, "Opened message store");

        Ok(Self {
            backend,
            identity: RwLock::new(identity),
            writer: Mutex::new(next_id),
            cache: Mutex::new(LruCache::new(cache_size)),
            shares,
        })
    }

    /// Store backed by memory only.
    pub fn in_memory(identity: OwnerIdentity) -> Self {
        let shares = ShareIndex::new();
        let cache_size = NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            backend: Box::new(MemoryBackend::new()),
            identity: RwLock::new(identity),
            writer: Mutex::new(MessageId(1)),
            cache: Mutex::new(LruCache::new(cache_size)),
            shares,
        }
    }

    // --- Identity ---

    pub fn identity(&self) -> OwnerIdentity {
        self.identity.read().clone()
    }

    /// Replace the owner identity. Waits for any in-flight write.
    pub fn set_identity(&self, identity: OwnerIdentity) {
        let _writer = self.writer.lock();
        *self.identity.write() = identity;
    }

    // --- Message Operations ---

    /// Create a message authored by the current owner.
    pub fn create(&self, draft: MessageDraft) -> Result<Message> {
        self.create_with_shares(draft, Vec::new())
    }

    /// Create a message whose `shares` list is already known.
    pub(crate) fn create_with_shares(
        &self,
        draft: MessageDraft,
        shares: Vec<String>,
    ) -> Result<Message> {
        ensure_distinct(&shares)?;

        let mut next_id = self.writer.lock();

        let identity = self.identity.read().clone();
        identity.validate()?;

        let id = *next_id;
        let now = Timestamp::now();

        let mut meta = draft.meta;
        if meta.origin_url.is_empty() {
            meta.origin_url = identity.post_url.clone();
        }

        let message = Message {
            id,
            username: identity.username,
            full_name: identity.full_name,
            content: Content {
                message: draft.content.message,
                urls: draft.content.urls,
                created: now,
                updated: now,
            },
            meta,
            shares,
        };

        self.write(&message)?;
        *next_id = id.next();
        drop(next_id);

        self.shares.add(&message);
        debug!(id = id.0, shared = message.meta.is_shared, "Created message");

        Ok(message)
    }

    /// Get a message by id.
    pub fn get(&self, id: MessageId) -> Result<Message> {
        if let Some(cached) = self.cache.lock().get(&id).cloned() {
            return Ok(cached);
        }

        let bytes = self.backend.get(id)?.ok_or(StoreError::NotFound(id))?;
        let message = decode(&bytes)?;
        self.cache.lock().put(id, message.clone());
        Ok(message)
    }

    /// Overwrite a stored message.
    ///
    /// `id` and `content.created` are kept from the stored record and
    /// `content.updated` is re-stamped; every other field comes from `message`.
    pub fn update(&self, message: Message) -> Result<Message> {
        ensure_distinct(&message.shares)?;

        let _writer = self.writer.lock();

        let stored = self.get(message.id)?;

        let mut updated = message;
        updated.content.created = stored.content.created;
        updated.content.updated = Timestamp::now_after(stored.content.updated);

        self.write(&updated)?;

        self.shares.remove(&stored);
        self.shares.add(&updated);
        debug!(id = updated.id.0, "Updated message");

        Ok(updated)
    }

    /// Delete a message. The id is never handed out again.
    pub fn delete(&self, id: MessageId) -> Result<()> {
        let _writer = self.writer.lock();

        let stored = self.get(id)?;
        if !self.backend.delete(id)? {
            return Err(StoreError::NotFound(id));
        }

        self.cache.lock().pop(&id);
        self.shares.remove(&stored);
        debug!(id = id.0, "Deleted message");

        Ok(())
    }

    /// All messages in id order, skipping the first `offset`. Private ones included.
    pub fn list_all(&self, offset: usize) -> Result<Vec<Message>> {
        self.backend
            .scan()?
            .into_iter()
            .skip(offset)
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backend.is_empty()
    }

    /// Local message already recorded under `key`.
    pub fn find_share(&self, key: &ShareKey) -> Option<MessageId> {
        self.shares.lookup(key)
    }

    /// Flush the backend.
    pub fn sync(&self) -> Result<()> {
        self.backend.sync()
    }

    fn write(&self, message: &Message) -> Result<()> {
        let bytes = rmp_serde::to_vec_named(message)?;
        self.backend.put(message.id, &bytes)?;
        self.cache.lock().put(message.id, message.clone());
        Ok(())
    }
}

fn decode(bytes: &[u8]) -> Result<Message> {
    Ok(rmp_serde::from_slice(bytes)?)
}

fn ensure_distinct(shares: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(shares.len());
    for url in shares {
        if !seen.insert(url.as_str()) {
            return Err(StoreError::Validation(format!(
                "shares lists {} more than once",
                url
            )));
        }
    }
    Ok(())
}
