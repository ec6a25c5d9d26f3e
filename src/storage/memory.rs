//! In-memory backend.

use super::Backend;
use crate::error::Result;
use crate::types::MessageId;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Default)]
struct Inner {
    entries: BTreeMap<MessageId, Vec<u8>>,
    high_water: MessageId,
}

/// Backend that keeps everything in a `BTreeMap`. Nothing survives a drop.
#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn get(&self, id: MessageId) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.read().entries.get(&id).cloned())
    }

    fn put(&self, id: MessageId, bytes: &[u8]) -> Result<()> {
        let mut inner = self.inner.write();
        inner.entries.insert(id, bytes.to_vec());
        inner.high_water = inner.high_water.max(id);
        Ok(())
    }

    fn delete(&self, id: MessageId) -> Result<bool> {
        Ok(self.inner.write().entries.remove(&id).is_some())
    }

    fn scan(&self) -> Result<Vec<(MessageId, Vec<u8>)>> {
        Ok(self
            .inner
            .read()
            .entries
            .iter()
            .map(|(id, bytes)| (*id, bytes.clone()))
            .collect())
    }

    fn high_water_mark(&self) -> MessageId {
        self.inner.read().high_water
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }
}
