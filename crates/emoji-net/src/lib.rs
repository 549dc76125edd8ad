//! Emoji Networking
//!
//! The fetch capability the replacer consumes. Hosts plug in any transport
//! by implementing [`Fetcher`]; an HTTP implementation and an in-memory one
//! are provided.

mod loader;
mod memory;

pub use loader::{HttpConfig, HttpFetcher};
pub use memory::MemoryFetcher;
pub use url::Url;

use async_trait::async_trait;

/// Opaque fetch capability
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET a URL. Any status is a successful fetch at this level.
    async fn fetch(&self, url: &str) -> Result<Response, NetError>;

    /// GET a URL, turning non-2xx statuses into [`NetError::HttpError`]
    async fn fetch_ok(&self, url: &str) -> Result<Response, NetError> {
        let response = self.fetch(url).await?;
        if response.ok() {
            Ok(response)
        } else {
            Err(NetError::HttpError {
                status: response.status,
            })
        }
    }
}

/// HTTP Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    /// Check if response is OK (2xx)
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get header value (case-insensitive name)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.clone()).map_err(|e| NetError::Network(e.to_string()))
    }
}

/// Network error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
