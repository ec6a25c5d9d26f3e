//! Feed exchange between instances.
//!
//! - [`FeedIngestor`]: pulls subscribed feeds and shares their posts
//! - [`FeedPublisher`]: builds this instance's own feed
//! - [`Transport`]: the fetch seam (`HttpTransport` with the `http` feature)
//!
//! Both sides speak the same document: `{ "posts": [ message, ... ] }`.

mod ingest;
mod publish;
mod transport;

pub use ingest::{parse_feed, FeedIngestor, ItemFailure, PullReport};
pub use publish::FeedPublisher;
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{FetchResponse, Transport};
