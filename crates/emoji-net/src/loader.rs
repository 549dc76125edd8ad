//! HTTP loader
//!
//! Blocking reqwest client run on smol's blocking thread pool, so the
//! cooperative executor never stalls on network I/O.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::{Fetcher, NetError, Response};

/// HTTP fetcher configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    /// Whole-request timeout; the replacer itself never times out a fetch
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("emoji-replacer/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Result<Self, NetError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(|e| NetError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Response, NetError> {
        let parsed = Url::parse(url).map_err(|e| NetError::InvalidUrl(format!("{url}: {e}")))?;
        tracing::info!("HTTP GET {}", parsed);

        let client = self.client.clone();
        smol::unblock(move || {
            let response = client
                .get(parsed)
                .send()
                .map_err(|e| NetError::Network(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();
            let body = response
                .bytes()
                .map_err(|e| NetError::Network(e.to_string()))?
                .to_vec();

            tracing::debug!("HTTP {} ({} bytes)", status, body.len());
            Ok(Response {
                status,
                headers,
                body,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert!(config.user_agent.starts_with("emoji-replacer/"));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_url_rejected_before_request() {
        let fetcher = HttpFetcher::new(HttpConfig::default()).unwrap();
        let result = smol::block_on(fetcher.fetch("not a url"));
        assert!(matches!(result, Err(NetError::InvalidUrl(_))));
    }
}
