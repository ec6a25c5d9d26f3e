//! Subscriptions to remote feeds.
//!
//! A subscription is just a feed URL. The registry keeps them as a set
//! (adding twice is a no-op) persisted to a small MessagePack file so the
//! pull cycle survives restarts.
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::load("./data/subscriptions.bin")?;
//! registry.subscribe("http://friend.example/recent.json")?;
//!
//! for url in registry.list() {
//!     println!("pulling {}", url);
//! }
//! ```

mod registry;

pub use registry::SubscriptionRegistry;
