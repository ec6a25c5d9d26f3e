//! Durable set of subscribed feed URLs.

use crate::error::{Result, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Magic bytes for the subscription file.
const SUBSCRIPTIONS_MAGIC: &[u8; 4] = b"SUB\0";

/// Current subscription file format version.
const SUBSCRIPTIONS_VERSION: u8 = 1;

/// Upper bound on the encoded subscription list.
const MAX_BODY_SIZE: usize = 16 * 1024 * 1024;

/// On-disk body of the subscription file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct SubscriptionList {
    /// Subscribed URLs in the order they were added.
    urls: Vec<String>,
}

/// Set of remote feeds this instance pulls.
pub struct SubscriptionRegistry {
    /// Backing file (None = memory only).
    path: Option<PathBuf>,

    urls: RwLock<Vec<String>>,
}

impl SubscriptionRegistry {
    /// Registry that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            urls: RwLock::new(Vec::new()),
        }
    }

    /// Load the registry from `path`, starting empty if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let list = if path.exists() {
            Self::read_file(&path)?
        } else {
            SubscriptionList::default()
        };

        debug!(path = %path.display(), count = list.urls.len(), "Loaded subscriptions");

        Ok(Self {
            path: Some(path),
            urls: RwLock::new(list.urls),
        })
    }

    /// Add a feed URL. Already-present URLs are left alone.
    pub fn subscribe(&self, url: &str) -> Result<()> {
        let url = normalize(url)?;

        let mut urls = self.urls.write();
        if urls.iter().any(|u| u == url) {
            return Ok(());
        }

        let mut next = urls.clone();
        next.push(url.to_string());
        self.save(&next)?;
        *urls = next;

        info!(url, "Subscribed");
        Ok(())
    }

    /// Remove a feed URL. Absent URLs are ignored.
    pub fn unsubscribe(&self, url: &str) -> Result<()> {
        let url = url.trim();

        let mut urls = self.urls.write();
        if !urls.iter().any(|u| u == url) {
            return Ok(());
        }

        let next: Vec<String> = urls.iter().filter(|u| *u != url).cloned().collect();
        self.save(&next)?;
        *urls = next;

        info!(url, "Unsubscribed");
        Ok(())
    }

    /// Current subscriptions in the order they were added.
    pub fn list(&self) -> Vec<String> {
        self.urls.read().clone()
    }

    pub fn contains(&self, url: &str) -> bool {
        let url = url.trim();
        self.urls.read().iter().any(|u| u == url)
    }

    pub fn len(&self) -> usize {
        self.urls.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the list to a temporary file and move it into place.
    fn save(&self, urls: &[String]) -> Result<()> {
        let path = match &self.path {
            Some(path) => path,
            None => return Ok(()),
        };

        let body = rmp_serde::to_vec_named(&SubscriptionList {
            urls: urls.to_vec(),
        })?;

        let tmp_path = path.with_extension("tmp");
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;

            file.write_all(SUBSCRIPTIONS_MAGIC)?;
            file.write_all(&[SUBSCRIPTIONS_VERSION])?;
            file.write_all(&(body.len() as u64).to_le_bytes())?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    fn read_file(path: &Path) -> Result<SubscriptionList> {
        let mut file = File::open(path)?;

        // Read magic
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != SUBSCRIPTIONS_MAGIC {
            return Err(StoreError::InvalidFormat(
                "Invalid subscription file magic".into(),
            ));
        }

        // Read version
        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != SUBSCRIPTIONS_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported subscription file version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);
        if len > MAX_BODY_SIZE as u64 {
            return Err(StoreError::Corruption(format!(
                "Subscription file claims {} bytes",
                len
            )));
        }

        let mut body = vec![0u8; len as usize];
        file.read_exact(&mut body)?;

        Ok(rmp_serde::from_slice(&body)?)
    }
}

fn normalize(url: &str) -> Result<&str> {
    let url = url.trim();
    if url.is_empty() {
        return Err(StoreError::Validation("subscription url is required".into()));
    }
    Ok(url)
}
