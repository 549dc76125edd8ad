//! Edge case tests for emoji-net
//!
//! Fetcher behaviour the replacer relies on: status handling, transport
//! errors, concurrent requests and request counting.

use std::sync::Arc;

use emoji_net::{Fetcher, MemoryFetcher, NetError};

// ============================================================================
// STATUS HANDLING
// ============================================================================

#[test]
fn test_plain_fetch_returns_any_status() {
    let fetcher = MemoryFetcher::new();
    fetcher.set_status("https://cdn/x.json", 503);

    let response = smol::block_on(fetcher.fetch("https://cdn/x.json")).unwrap();
    assert_eq!(response.status, 503);
    assert!(!response.ok());
}

#[test]
fn test_fetch_ok_maps_non_2xx() {
    let fetcher = MemoryFetcher::new();
    fetcher.set_status("https://cdn/x.json", 403);

    let err = smol::block_on(fetcher.fetch_ok("https://cdn/x.json")).unwrap_err();
    assert_eq!(err, NetError::HttpError { status: 403 });
    assert_eq!(err.to_string(), "HTTP error: 403");
}

#[test]
fn test_transport_error_propagates() {
    let fetcher = MemoryFetcher::new();
    fetcher.set_error("https://cdn/x.json", NetError::Network("connection reset".into()));

    let err = smol::block_on(fetcher.fetch_ok("https://cdn/x.json")).unwrap_err();
    assert!(matches!(err, NetError::Network(msg) if msg == "connection reset"));
}

// ============================================================================
// BODIES
// ============================================================================

#[test]
fn test_body_text_utf8() {
    let fetcher = MemoryFetcher::new();
    fetcher.set_body("https://cdn/raw", "héllo 😀");

    let response = smol::block_on(fetcher.fetch_ok("https://cdn/raw")).unwrap();
    assert_eq!(response.text().unwrap(), "héllo 😀");
}

#[test]
fn test_overwriting_response() {
    let fetcher = MemoryFetcher::new();
    fetcher.set_status("https://cdn/a", 500);
    fetcher.set_body("https://cdn/a", "ok");

    let response = smol::block_on(fetcher.fetch_ok("https://cdn/a")).unwrap();
    assert_eq!(response.body, b"ok");
}

// ============================================================================
// CONCURRENCY AND COUNTING
// ============================================================================

#[test]
fn test_concurrent_requests_are_all_counted() {
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.set_body("https://cdn/a", "a");

    smol::block_on(async {
        let requests = (0..5).map(|_| {
            let fetcher = fetcher.clone();
            smol::spawn(async move { fetcher.fetch_ok("https://cdn/a").await })
        });
        let tasks: Vec<_> = requests.collect();
        for task in tasks {
            assert!(task.await.is_ok());
        }
    });

    assert_eq!(fetcher.request_count("https://cdn/a"), 5);
    assert_eq!(fetcher.request_count("https://cdn/b"), 0);
    assert_eq!(fetcher.total_requests(), 5);
}

#[test]
fn test_fetcher_is_object_safe() {
    let fetcher: Arc<dyn Fetcher> = Arc::new(MemoryFetcher::new());
    let response = smol::block_on(fetcher.fetch("https://cdn/none")).unwrap();
    assert_eq!(response.status, 404);
}
