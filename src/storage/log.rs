//! Append-only message log.
//!
//! Every put appends the full serialized message and every delete appends a
//! tombstone; the newest entry for an id wins. The id → offset index lives
//! in memory and is rebuilt by replaying the log on open.

use super::Backend;
use crate::error::{Result, StoreError};
use crate::types::MessageId;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Magic bytes for log entries.
const LOG_MAGIC: &[u8; 4] = b"MSG\0";

/// Current log format version.
const LOG_VERSION: u8 = 1;

/// Entry header size (fixed part).
const ENTRY_HEADER_SIZE: usize = 4 + 1 + 1 + 8 + 4; // magic + version + kind + id + payload length

const CHECKSUM_SIZE: usize = 4;

/// Upper bound on a single serialized message.
const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryKind {
    Put,
    Tombstone,
}

impl EntryKind {
    fn to_byte(self) -> u8 {
        match self {
            EntryKind::Put => 0,
            EntryKind::Tombstone => 1,
        }
    }

    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0 => Ok(EntryKind::Put),
            1 => Ok(EntryKind::Tombstone),
            other => Err(StoreError::InvalidFormat(format!(
                "Unknown log entry kind: {}",
                other
            ))),
        }
    }
}

struct LogEntry {
    kind: EntryKind,
    id: MessageId,
    payload: Vec<u8>,
}

impl LogEntry {
    fn encoded_len(&self) -> u64 {
        (ENTRY_HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE) as u64
    }
}

/// Append-only log backend.
pub struct LogBackend {
    /// Path to the log file.
    path: PathBuf,

    /// Log file handle.
    file: Mutex<File>,

    /// Offset of the newest put for every live id.
    index: RwLock<BTreeMap<MessageId, u64>>,

    /// Highest id ever written (tombstoned ids included).
    high_water: RwLock<MessageId>,

    /// Current file size (for appending).
    file_size: RwLock<u64>,

    /// Number of writes since last sync.
    writes_since_sync: Mutex<u64>,

    /// Sync every N writes.
    sync_interval: u64,
}

impl LogBackend {
    /// Default sync interval - every write.
    const DEFAULT_SYNC_INTERVAL: u64 = 1;

    /// Open or create a message log, syncing every write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_sync_interval(path, Self::DEFAULT_SYNC_INTERVAL)
    }

    /// Open or create a message log with custom sync interval.
    /// - sync_interval = 0 or 1: sync every write
    /// - sync_interval = 100: sync every 100 writes
    pub fn open_with_sync_interval(path: impl AsRef<Path>, sync_interval: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let (index, high_water, valid_len) = Self::replay(&file)?;

        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            warn!(
                path = %path.display(),
                valid_len,
                file_len,
                "Truncating incomplete entry at end of message log"
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }

        debug!(path = %path.display(), live = index.len(), high_water = high_water.0, "Opened message log");

        Ok(Self {
            path,
            file: Mutex::new(file),
            index: RwLock::new(index),
            high_water: RwLock::new(high_water),
            file_size: RwLock::new(valid_len),
            writes_since_sync: Mutex::new(0),
            sync_interval: sync_interval.max(1),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size in bytes.
    pub fn size(&self) -> u64 {
        *self.file_size.read()
    }

    /// Replay the whole log, returning the index, the high-water mark and
    /// the length of the valid prefix.
    fn replay(file: &File) -> Result<(BTreeMap<MessageId, u64>, MessageId, u64)> {
        let mut handle = file.try_clone()?;
        handle.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(handle);

        let mut index = BTreeMap::new();
        let mut high_water = MessageId(0);
        let mut offset = 0u64;

        loop {
            if reader.fill_buf()?.is_empty() {
                break;
            }

            let entry = match Self::read_entry(&mut reader) {
                Ok(entry) => entry,
                // A crash mid-append leaves a short final entry.
                Err(StoreError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            };

            high_water = high_water.max(entry.id);
            match entry.kind {
                EntryKind::Put => {
                    index.insert(entry.id, offset);
                }
                EntryKind::Tombstone => {
                    index.remove(&entry.id);
                }
            }
            offset += entry.encoded_len();
        }

        Ok((index, high_water, offset))
    }

    /// Append an entry, returning the offset where it was written.
    fn append(&self, kind: EntryKind, id: MessageId, payload: &[u8]) -> Result<u64> {
        let mut file = self.file.lock();

        let offset = *self.file_size.read();
        let encoded = Self::encode_entry(kind, id, payload);

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&encoded)?;
        *self.file_size.write() = offset + encoded.len() as u64;

        let mut writes = self.writes_since_sync.lock();
        *writes += 1;
        if *writes >= self.sync_interval {
            file.sync_all()?;
            *writes = 0;
        }

        Ok(offset)
    }

    /// Read the entry at a given offset.
    fn read_at(&self, offset: u64) -> Result<LogEntry> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        Self::read_entry(&mut *file)
    }

    fn encode_entry(kind: EntryKind, id: MessageId, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENTRY_HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
        buf.extend_from_slice(LOG_MAGIC);
        buf.push(LOG_VERSION);
        buf.push(kind.to_byte());
        buf.extend_from_slice(&id.0.to_le_bytes());
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);

        // Checksum covers everything after the magic
        let checksum = crc32fast::hash(&buf[LOG_MAGIC.len()..]);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    fn read_entry(reader: &mut impl Read) -> Result<LogEntry> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        reader.read_exact(&mut header)?;

        if &header[0..4] != LOG_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid log entry magic".into()));
        }

        if header[4] != LOG_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported log version: {}",
                header[4]
            )));
        }

        let kind = EntryKind::from_byte(header[5])?;

        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&header[6..14]);
        let id = MessageId(u64::from_le_bytes(id_bytes));

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&header[14..18]);
        let payload_len = u32::from_le_bytes(len_bytes) as usize;

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(StoreError::Corruption(format!(
                "Log entry for {} claims {} bytes",
                id, payload_len
            )));
        }

        let mut payload = vec![0u8; payload_len];
        reader.read_exact(&mut payload)?;

        let mut checksum_bytes = [0u8; 4];
        reader.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header[LOG_MAGIC.len()..]);
        hasher.update(&payload);
        let computed_checksum = hasher.finalize();

        if stored_checksum != computed_checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        Ok(LogEntry { kind, id, payload })
    }
}

impl Backend for LogBackend {
    fn get(&self, id: MessageId) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.read().get(&id).copied() {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let entry = self.read_at(offset)?;
        if entry.id != id || entry.kind != EntryKind::Put {
            return Err(StoreError::Corruption(format!(
                "Index points {} at an entry for {}",
                id, entry.id
            )));
        }
        Ok(Some(entry.payload))
    }

    fn put(&self, id: MessageId, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_PAYLOAD_SIZE {
            return Err(StoreError::Serialization(format!(
                "Message {} is {} bytes, limit is {}",
                id,
                bytes.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let offset = self.append(EntryKind::Put, id, bytes)?;
        self.index.write().insert(id, offset);

        let mut high_water = self.high_water.write();
        *high_water = (*high_water).max(id);
        Ok(())
    }

    fn delete(&self, id: MessageId) -> Result<bool> {
        if !self.index.read().contains_key(&id) {
            return Ok(false);
        }

        self.append(EntryKind::Tombstone, id, &[])?;
        self.index.write().remove(&id);
        Ok(true)
    }

    fn scan(&self) -> Result<Vec<(MessageId, Vec<u8>)>> {
        let offsets: Vec<(MessageId, u64)> = self
            .index
            .read()
            .iter()
            .map(|(id, offset)| (*id, *offset))
            .collect();

        let mut entries = Vec::with_capacity(offsets.len());
        for (id, offset) in offsets {
            let entry = self.read_at(offset)?;
            if entry.id != id {
                return Err(StoreError::Corruption(format!(
                    "Index points {} at an entry for {}",
                    id, entry.id
                )));
            }
            entries.push((id, entry.payload));
        }
        Ok(entries)
    }

    fn high_water_mark(&self) -> MessageId {
        *self.high_water.read()
    }

    fn len(&self) -> usize {
        self.index.read().len()
    }

    fn sync(&self) -> Result<()> {
        let file = self.file.lock();
        file.sync_all()?;
        *self.writes_since_sync.lock() = 0;
        Ok(())
    }
}
