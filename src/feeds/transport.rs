//! Fetching feed documents.

use crate::error::Result;
#[cfg(feature = "http")]
use crate::error::StoreError;
#[cfg(feature = "http")]
use std::time::Duration;

/// Raw reply to a feed fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// A 200 reply with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches a URL. Implementations report connection-level failures as
/// [`StoreError::Fetch`](crate::StoreError::Fetch); status handling is left
/// to the caller.
pub trait Transport: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

/// Blocking HTTP transport backed by `reqwest`.
#[cfg(feature = "http")]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("murmur/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let fetch_error = |e: reqwest::Error| StoreError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .map_err(fetch_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(fetch_error)?.to_vec();

        Ok(FetchResponse { status, body })
    }
}
