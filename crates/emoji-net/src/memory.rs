//! In-memory fetcher
//!
//! Serves canned responses by URL and counts requests, so hosts and tests
//! can run the replacer without a network. Unknown URLs answer 404.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Fetcher, NetError, Response};

#[derive(Debug, Default)]
struct State {
    responses: HashMap<String, Result<Response, NetError>>,
    requests: HashMap<String, usize>,
}

/// Fetcher serving responses from memory
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    state: Mutex<State>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `value` as a 200 JSON body
    pub fn with_json(self, url: &str, value: serde_json::Value) -> Self {
        self.set_json(url, value);
        self
    }

    pub fn set_json(&self, url: &str, value: serde_json::Value) {
        let mut response = Response::new(200, value.to_string().into_bytes());
        response
            .headers
            .push(("Content-Type".into(), "application/json".into()));
        self.set_response(url, Ok(response));
    }

    /// Serve a raw 200 body
    pub fn set_body(&self, url: &str, body: &str) {
        self.set_response(url, Ok(Response::new(200, body.as_bytes().to_vec())));
    }

    /// Answer with an empty body and the given status
    pub fn set_status(&self, url: &str, status: u16) {
        self.set_response(url, Ok(Response::new(status, Vec::new())));
    }

    /// Fail at the transport level
    pub fn set_error(&self, url: &str, error: NetError) {
        self.set_response(url, Err(error));
    }

    fn set_response(&self, url: &str, response: Result<Response, NetError>) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(url.to_string(), response);
    }

    /// Number of requests made for `url`
    pub fn request_count(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .requests
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Number of requests made for any URL
    pub fn total_requests(&self) -> usize {
        self.state.lock().unwrap().requests.values().sum()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Response, NetError> {
        let response = {
            let mut state = self.state.lock().unwrap();
            *state.requests.entry(url.to_string()).or_insert(0) += 1;
            state
                .responses
                .get(url)
                .cloned()
                .unwrap_or_else(|| Ok(Response::new(404, Vec::new())))
        };
        // Let concurrent callers overlap the way a real round trip would.
        smol::future::yield_now().await;
        tracing::debug!("memory fetch {}", url);
        response
    }
}
