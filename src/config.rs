//! Instance configuration.

use crate::error::{Result, StoreError};
use std::path::PathBuf;
use std::time::Duration;

/// Author metadata of the local owner.
///
/// Stamped onto every message at creation time. All three fields must be
/// non-empty before a message can be created.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnerIdentity {
    pub full_name: String,
    pub username: String,
    /// URL of this instance's own feed.
    pub post_url: String,
}

impl OwnerIdentity {
    pub fn new(
        full_name: impl Into<String>,
        username: impl Into<String>,
        post_url: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            username: username.into(),
            post_url: post_url.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Fail with the first missing field.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("fullName", &self.full_name),
            ("username", &self.username),
            ("postUrl", &self.post_url),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(StoreError::Validation(format!("owner {} is required", name)));
            }
        }
        Ok(())
    }
}

/// Instance configuration.
#[derive(Clone, Debug)]
pub struct InstanceConfig {
    /// Data directory for the instance.
    pub path: PathBuf,

    /// Whether to create the instance if it doesn't exist.
    pub create_if_missing: bool,

    /// Owner identity stamped on new messages.
    pub identity: OwnerIdentity,

    /// Decoded message cache size (number of messages).
    pub message_cache_size: usize,

    /// Sync the message log every N writes (0 = every write).
    pub sync_interval: u64,

    /// Timeout for a single feed fetch.
    pub fetch_timeout: Duration,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./murmur"),
            create_if_missing: true,
            identity: OwnerIdentity::default(),
            message_cache_size: 256,
            sync_interval: 0,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}
