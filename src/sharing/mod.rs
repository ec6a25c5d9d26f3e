//! Re-sharing of messages authored on other instances.
//!
//! A share is a local copy of a remote message annotated with the feed URL
//! it was pulled from. Sharing is append-only and idempotent per source:
//! pulling the same feed twice must not produce a second local copy.

mod engine;
mod index;

pub use engine::SharingEngine;
pub use index::{ShareIndex, ShareKey};
