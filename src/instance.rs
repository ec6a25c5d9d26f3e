//! Main Instance struct tying all components together.

use crate::config::{InstanceConfig, OwnerIdentity};
use crate::error::{Result, StoreError};
#[cfg(feature = "http")]
use crate::feeds::HttpTransport;
use crate::feeds::{FeedIngestor, FeedPublisher, PullReport, Transport};
use crate::messages::MessageStore;
use crate::sharing::SharingEngine;
use crate::storage::LogBackend;
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{ExternalMessage, Feed, Message, MessageDraft, MessageId};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Magic bytes for the instance manifest.
const INSTANCE_MAGIC: &[u8; 4] = b"MUR\0";

/// Current instance format version.
const INSTANCE_VERSION: u8 = 1;

/// A single owner's micro-publishing instance.
///
/// Provides a unified interface for:
/// - Authoring, editing and deleting messages
/// - Sharing messages from other instances
/// - Managing and pulling subscriptions
/// - Publishing the public feed
pub struct Instance {
    /// Instance configuration.
    config: InstanceConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    messages: Arc<MessageStore>,
    subscriptions: Arc<SubscriptionRegistry>,
    sharing: Arc<SharingEngine>,
    ingestor: FeedIngestor,
    publisher: FeedPublisher,
}

impl Instance {
    /// Open an existing instance or create a new one, pulling over HTTP.
    #[cfg(feature = "http")]
    pub fn open_or_create(config: InstanceConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.fetch_timeout)?);
        Self::open_or_create_with_transport(config, transport)
    }

    /// Open an existing instance or create a new one with a custom transport.
    pub fn open_or_create_with_transport(
        config: InstanceConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config, transport)
        } else if config.create_if_missing {
            Self::init(config, transport)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Initialize a new instance in `config.path`.
    pub fn init(config: InstanceConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;
        Self::assemble(config, transport)
    }

    /// Open an existing instance.
    pub fn open(config: InstanceConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::verify_manifest(&config.path)?;
        Self::assemble(config, transport)
    }

    fn assemble(config: InstanceConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let lock_file = Self::acquire_lock(&config.path)?;

        let backend = LogBackend::open_with_sync_interval(
            config.path.join("messages.log"),
            config.sync_interval,
        )?;
        let messages = Arc::new(MessageStore::open(
            Box::new(backend),
            config.identity.clone(),
            config.message_cache_size,
        )?);
        let subscriptions = Arc::new(SubscriptionRegistry::load(
            config.path.join("subscriptions.bin"),
        )?);
        let sharing = Arc::new(SharingEngine::new(Arc::clone(&messages)));
        let ingestor = FeedIngestor::new(
            Arc::clone(&subscriptions),
            Arc::clone(&sharing),
            transport,
        );
        let publisher = FeedPublisher::new(Arc::clone(&messages));

        info!(
            path = %config.path.display(),
            messages = messages.len(),
            subscriptions = subscriptions.len(),
            "Opened instance"
        );

        Ok(Self {
            config,
            _lock_file: lock_file,
            messages,
            subscriptions,
            sharing,
            ingestor,
            publisher,
        })
    }

    // --- Identity ---

    pub fn identity(&self) -> OwnerIdentity {
        self.messages.identity()
    }

    /// Replace the owner identity used for new messages.
    pub fn set_identity(&self, identity: OwnerIdentity) {
        self.messages.set_identity(identity);
    }

    // --- Message Operations ---

    pub fn create(&self, draft: MessageDraft) -> Result<Message> {
        self.messages.create(draft)
    }

    pub fn get(&self, id: MessageId) -> Result<Message> {
        self.messages.get(id)
    }

    pub fn update(&self, message: Message) -> Result<Message> {
        self.messages.update(message)
    }

    pub fn delete(&self, id: MessageId) -> Result<()> {
        self.messages.delete(id)
    }

    pub fn list_all(&self, offset: usize) -> Result<Vec<Message>> {
        self.messages.list_all(offset)
    }

    // --- Sharing ---

    pub fn share(&self, external: &ExternalMessage, source_url: &str) -> Result<Message> {
        self.sharing.share(external, source_url)
    }

    // --- Subscriptions ---

    pub fn subscribe(&self, url: &str) -> Result<()> {
        self.subscriptions.subscribe(url)
    }

    pub fn unsubscribe(&self, url: &str) -> Result<()> {
        self.subscriptions.unsubscribe(url)
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.list()
    }

    pub fn pull(&self, url: &str) -> Result<PullReport> {
        self.ingestor.pull(url)
    }

    pub fn pull_all(&self) -> Vec<(String, Result<PullReport>)> {
        self.ingestor.pull_all()
    }

    // --- Publishing ---

    pub fn recent(&self, offset: usize) -> Result<Vec<Message>> {
        self.publisher.recent(offset)
    }

    pub fn recent_feed(&self, offset: usize) -> Result<Feed> {
        self.publisher.recent_feed(offset)
    }

    pub fn one(&self, id: MessageId) -> Result<Message> {
        self.publisher.one(id)
    }

    // --- Maintenance ---

    /// Flush the message log.
    pub fn sync(&self) -> Result<()> {
        self.messages.sync()
    }

    /// Get the instance path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::create(manifest_path)?;

        file.write_all(INSTANCE_MAGIC)?;
        file.write_all(&[INSTANCE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let manifest_path = path.join("MANIFEST");
        let mut file = File::open(manifest_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != INSTANCE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid instance magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != INSTANCE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported instance version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let lock_file = File::create(lock_path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        Ok(lock_file)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.sync();
    }
}
