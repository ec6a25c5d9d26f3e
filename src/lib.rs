//! # Murmur
//!
//! A personal, self-hosted micro-publishing store. One owner writes short
//! messages, re-shares messages from other instances, and subscribes to
//! remote feeds that are pulled and shared locally.
//!
//! ## Core Concepts
//!
//! - **Messages**: Owner-authored posts with links, location and privacy flag
//! - **Shares**: Local copies of remote posts, deduplicated per source feed
//! - **Subscriptions**: Remote feed URLs pulled on demand
//! - **Feed**: The `{ "posts": [...] }` document of this instance's public messages
//!
//! ## Example
//!
//! ```ignore
//! use murmur::{Instance, InstanceConfig, MessageDraft, OwnerIdentity};
//!
//! let instance = Instance::open_or_create(InstanceConfig {
//!     path: "./my-instance".into(),
//!     identity: OwnerIdentity::new("Ada", "ada", "https://ada.example/recent.json"),
//!     ..Default::default()
//! })?;
//!
//! // Write a message
//! let message = instance.create(MessageDraft::new("Hello, world!"))?;
//!
//! // Follow someone and pull their feed
//! instance.subscribe("https://friend.example/recent.json")?;
//! let report = instance.pull("https://friend.example/recent.json")?;
//! println!("{} new shares", report.shared.len());
//! ```

pub mod config;
pub mod error;
pub mod feeds;
pub mod instance;
pub mod messages;
pub mod sharing;
pub mod storage;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::{InstanceConfig, OwnerIdentity};
pub use error::{Result, StoreError};
#[cfg(feature = "http")]
pub use feeds::HttpTransport;
pub use feeds::{
    parse_feed, FeedIngestor, FeedPublisher, FetchResponse, ItemFailure, PullReport, Transport,
};
pub use instance::Instance;
pub use messages::MessageStore;
pub use sharing::{ShareIndex, ShareKey, SharingEngine};
pub use storage::{Backend, LogBackend, MemoryBackend};
pub use subscriptions::SubscriptionRegistry;
pub use types::*;
