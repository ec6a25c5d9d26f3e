//! Key-value backends for serialized messages.
//!
//! The message store only needs an ordered map from numeric id to bytes.
//! Two implementations are provided:
//! - [`MemoryBackend`]: a `BTreeMap`, for tests and throwaway instances
//! - [`LogBackend`]: an append-only, checksummed log file with an in-memory
//!   id → offset index rebuilt on open

mod log;
mod memory;

pub use log::LogBackend;
pub use memory::MemoryBackend;

use crate::error::Result;
use crate::types::MessageId;

/// Ordered, durable mapping from message id to serialized message.
pub trait Backend: Send + Sync {
    /// Read the bytes stored under `id`.
    fn get(&self, id: MessageId) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite the bytes stored under `id`.
    fn put(&self, id: MessageId, bytes: &[u8]) -> Result<()>;

    /// Remove `id`. Returns false if nothing was stored.
    fn delete(&self, id: MessageId) -> Result<bool>;

    /// All live entries in ascending id order.
    fn scan(&self) -> Result<Vec<(MessageId, Vec<u8>)>>;

    /// Highest id ever written, including deleted ones. `MessageId(0)` when empty.
    fn high_water_mark(&self) -> MessageId;

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush pending writes to durable storage.
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
