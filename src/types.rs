//! Core types for the message store.
//!
//! Wire names are camelCase so that a message serialized here is the same
//! document a remote instance reads out of our feed.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a message.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    pub fn next(self) -> Self {
        MessageId(self.0 + 1)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_micros() as i64)
    }

    /// Current time, bumped past `floor` if the clock has not moved.
    pub fn now_after(floor: Timestamp) -> Self {
        let now = Self::now();
        if now > floor {
            now
        } else {
            Timestamp(floor.0 + 1)
        }
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// A titled link attached to a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    pub url: String,
}

impl Link {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Body of a stored message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub message: String,
    #[serde(default)]
    pub urls: Vec<Link>,
    pub created: Timestamp,
    pub updated: Timestamp,
}

/// Routing and visibility flags of a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    /// Feed this message nominally belongs to.
    #[serde(default)]
    pub origin_url: String,

    #[serde(default)]
    pub location: String,

    #[serde(default)]
    pub is_private: bool,

    #[serde(default)]
    pub is_shared: bool,

    /// Id the message carried on the instance it was shared from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<MessageId>,
}

/// A message as stored and published.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub username: String,
    pub full_name: String,
    pub content: Content,
    pub meta: Meta,
    /// Feed URLs this message has been shared to or from. Never repeats.
    #[serde(default)]
    pub shares: Vec<String>,
}

impl Message {
    pub fn is_public(&self) -> bool {
        !self.meta.is_private
    }
}

/// Caller-supplied body of a new message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftContent {
    pub message: String,
    #[serde(default)]
    pub urls: Vec<Link>,
}

/// Input for creating a new message (before id, author and timestamps are assigned).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub content: DraftContent,
    #[serde(default)]
    pub meta: Meta,
}

impl MessageDraft {
    /// Create a public draft with the given text.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            content: DraftContent {
                message: message.into(),
                urls: Vec::new(),
            },
            ..Default::default()
        }
    }

    /// Attach a link.
    pub fn with_link(mut self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.content.urls.push(Link::new(title, url));
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.meta.location = location.into();
        self
    }

    pub fn with_origin_url(mut self, origin_url: impl Into<String>) -> Self {
        self.meta.origin_url = origin_url.into();
        self
    }

    /// Mark the draft private.
    pub fn private(mut self) -> Self {
        self.meta.is_private = true;
        self
    }
}

/// Body of a message read from a remote feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalContent {
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urls: Vec<Link>,
}

/// Meta block of a message read from a remote feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMeta {
    pub origin_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
}

/// A message authored on another instance.
///
/// Only the fields a share needs are read; anything else in the remote
/// document is ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMessage {
    /// Remote id. Anything other than an unsigned integer reads as `None`.
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<MessageId>,
    pub content: ExternalContent,
    pub meta: ExternalMeta,
}

impl ExternalMessage {
    pub fn new(message: impl Into<String>, origin_url: impl Into<String>) -> Self {
        Self {
            id: None,
            content: ExternalContent {
                message: message.into(),
                urls: Vec::new(),
            },
            meta: ExternalMeta {
                origin_url: origin_url.into(),
                location: String::new(),
            },
        }
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }
}

impl From<&Message> for ExternalMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: Some(message.id),
            content: ExternalContent {
                message: message.content.message.clone(),
                urls: message.content.urls.clone(),
            },
            meta: ExternalMeta {
                origin_url: message.meta.origin_url.clone(),
                location: message.meta.location.clone(),
            },
        }
    }
}

/// Reads an explicit `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<MessageId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_u64().map(MessageId))
}

/// The outward feed document: `{ "posts": [...] }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub posts: Vec<Message>,
}
