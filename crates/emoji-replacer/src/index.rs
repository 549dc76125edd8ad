//! Index Cache
//!
//! Set id -> location, loaded once and lazily. A load either replaces the
//! whole map or leaves the previous contents untouched.
//!
//! The same document is also read as a per-emoji map (`{"name": {"alt": ..,
//! "keywords": [..]}}`), which is what flat markers resolve against when no
//! default set is configured. Only object entries carrying `alt` or
//! `keywords` count as emoji; set locations never do.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use emoji_net::Fetcher;
use serde_json::Value;

use crate::error::{ReplaceError, ReplaceResult};
use crate::flight::SingleFlight;
use crate::source::{
    normalize_index, normalize_set, EmojiEntry, ImageDefaults, IndexEntry, IndexSource,
    ResolvedSet, SetSource,
};

/// One loaded index document
#[derive(Debug, Clone, Default)]
struct LoadedIndex {
    sets: HashMap<String, IndexEntry>,
    emoji: ResolvedSet,
}

#[derive(Default)]
struct IndexState {
    entries: Option<Arc<LoadedIndex>>,
    /// Bumped by `clear`; a load started under an older generation is not stored
    generation: u64,
}

struct IndexInner {
    url: Option<String>,
    fetcher: Arc<dyn Fetcher>,
    defaults: ImageDefaults,
    state: Mutex<IndexState>,
    flight: SingleFlight<(), Arc<LoadedIndex>>,
}

/// Shared handle to the index cache
#[derive(Clone)]
pub struct IndexCache {
    inner: Arc<IndexInner>,
}

impl IndexCache {
    pub fn new(url: Option<String>, fetcher: Arc<dyn Fetcher>, defaults: ImageDefaults) -> Self {
        Self {
            inner: Arc::new(IndexInner {
                url,
                fetcher,
                defaults,
                state: Mutex::new(IndexState::default()),
                flight: SingleFlight::new(),
            }),
        }
    }

    /// Load the index unless it is already loaded. Concurrent callers share
    /// one fetch.
    pub async fn ensure_loaded(&self) -> ReplaceResult<()> {
        let generation = {
            let state = self.inner.state.lock().unwrap();
            if state.entries.is_some() {
                return Ok(());
            }
            state.generation
        };

        let url = self.inner.url.clone().ok_or(ReplaceError::NoIndex)?;
        let inner = Arc::clone(&self.inner);
        self.inner
            .flight
            .run((), move || load(inner, url, generation))
            .await
            .map(|_| ())
    }

    pub fn lookup(&self, set_id: &str) -> Option<IndexEntry> {
        let state = self.inner.state.lock().unwrap();
        state.entries.as_ref().and_then(|m| m.sets.get(set_id).cloned())
    }

    /// Entry of the index document read as a per-emoji map
    pub fn emoji(&self, name: &str) -> Option<EmojiEntry> {
        let state = self.inner.state.lock().unwrap();
        state.entries.as_ref().and_then(|m| m.emoji.get(name).cloned())
    }

    /// Names of the index document read as a per-emoji map, sorted
    pub fn emoji_names(&self) -> Vec<String> {
        let state = self.inner.state.lock().unwrap();
        state
            .entries
            .as_ref()
            .map(|m| m.emoji.ids())
            .unwrap_or_default()
    }

    /// Known set ids, sorted
    pub fn set_ids(&self) -> Vec<String> {
        let state = self.inner.state.lock().unwrap();
        let mut ids: Vec<String> = state
            .entries
            .as_ref()
            .map(|m| m.sets.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.lock().unwrap().entries.is_some()
    }

    pub fn has_source(&self) -> bool {
        self.inner.url.is_some()
    }

    /// Drop the loaded index; the next `ensure_loaded` fetches again
    pub fn clear(&self) {
        let mut state = self.inner.state.lock().unwrap();
        state.entries = None;
        state.generation += 1;
        self.inner.flight.forget(None);
    }
}

async fn load(
    inner: Arc<IndexInner>,
    url: String,
    generation: u64,
) -> ReplaceResult<Arc<LoadedIndex>> {
    tracing::info!("Loading emoji index from {}", url);
    let result = fetch_index(&inner, &url).await;

    match result {
        Ok(entries) => {
            let entries = Arc::new(entries);
            let mut state = inner.state.lock().unwrap();
            if state.generation == generation {
                state.entries = Some(Arc::clone(&entries));
                tracing::info!(
                    "Loaded emoji index: {} sets, {} entries",
                    entries.sets.len(),
                    entries.emoji.len()
                );
            } else {
                tracing::debug!("Index cleared during load, result not stored");
            }
            Ok(entries)
        }
        Err(err) => {
            tracing::error!("Failed to load emoji index: {}", err);
            Err(err)
        }
    }
}

async fn fetch_index(inner: &IndexInner, url: &str) -> ReplaceResult<LoadedIndex> {
    let response = inner.fetcher.fetch_ok(url).await?;
    let value: Value = serde_json::from_slice(&response.body)?;
    let emoji = normalize_set(SetSource::from_value(emoji_entries(&value))?, &inner.defaults);
    let sets = normalize_index(IndexSource::from_value(value)?, &inner.defaults);
    Ok(LoadedIndex { sets, emoji })
}

/// The per-emoji records of an index document
fn emoji_entries(value: &Value) -> Value {
    let is_emoji = |v: &Value| {
        v.as_object()
            .is_some_and(|fields| fields.contains_key("alt") || fields.contains_key("keywords"))
    };
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| is_emoji(v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        ),
        Value::Array(records) => Value::Array(records.iter().filter(|v| is_emoji(v)).cloned().collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IndexLocation;
    use emoji_net::MemoryFetcher;
    use serde_json::json;

    const INDEX: &str = "https://x/index.json";

    fn defaults() -> ImageDefaults {
        ImageDefaults {
            base_url: "https://cdn/".into(),
            format: "png".into(),
        }
    }

    fn cache(fetcher: &Arc<MemoryFetcher>) -> IndexCache {
        IndexCache::new(Some(INDEX.into()), fetcher.clone(), defaults())
    }

    #[test]
    fn test_load_and_lookup() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_json(INDEX, json!({"s1": "https://x/s1.json"}));
        let index = cache(&fetcher);

        assert!(!index.is_loaded());
        smol::block_on(index.ensure_loaded()).unwrap();
        assert!(index.is_loaded());
        assert_eq!(
            index.lookup("s1").map(|e| e.location),
            Some(IndexLocation::Remote("https://x/s1.json".into()))
        );
        assert!(index.lookup("s2").is_none());

        smol::block_on(index.ensure_loaded()).unwrap();
        assert_eq!(fetcher.request_count(INDEX), 1);
    }

    #[test]
    fn test_concurrent_loads_single_flight() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_json(INDEX, json!([{"id": "s1", "url": "u"}]));
        let index = cache(&fetcher);

        let results = smol::block_on(futures::future::join_all(
            (0..5).map(|_| index.ensure_loaded()),
        ));
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(fetcher.request_count(INDEX), 1);
    }

    #[test]
    fn test_failed_load_stores_nothing() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_json(INDEX, json!({"s1": "u1"}));
        let index = cache(&fetcher);
        smol::block_on(index.ensure_loaded()).unwrap();

        index.clear();
        fetcher.set_status(INDEX, 500);
        let err = smol::block_on(index.ensure_loaded()).unwrap_err();
        assert_eq!(
            err,
            ReplaceError::Fetch(emoji_net::NetError::HttpError { status: 500 })
        );
        assert!(!index.is_loaded());

        fetcher.set_json(INDEX, json!({"s1": "u1", "s2": "u2"}));
        smol::block_on(index.ensure_loaded()).unwrap();
        assert_eq!(index.set_ids(), vec!["s1", "s2"]);
    }

    #[test]
    fn test_malformed_index() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_body(INDEX, "not json");
        let index = cache(&fetcher);
        assert!(matches!(
            smol::block_on(index.ensure_loaded()),
            Err(ReplaceError::Parse(_))
        ));

        fetcher.set_json(INDEX, json!("a string"));
        assert!(matches!(
            smol::block_on(index.ensure_loaded()),
            Err(ReplaceError::Parse(_))
        ));
        assert!(!index.is_loaded());
    }

    #[test]
    fn test_per_emoji_view() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_json(
            INDEX,
            json!({
                "smile": {"alt": "Smiling face", "keywords": ["happy"]},
                "wave": {"alt": "Waving hand"}
            }),
        );
        let index = cache(&fetcher);
        smol::block_on(index.ensure_loaded()).unwrap();

        let smile = index.emoji("smile").unwrap();
        assert_eq!(smile.descriptor.display_label, "Smiling face");
        assert_eq!(
            smile.render,
            crate::source::RenderSpec::Image {
                url: "https://cdn/smile.png".into()
            }
        );
        assert_eq!(index.emoji_names(), vec!["smile", "wave"]);
    }

    #[test]
    fn test_set_locations_are_not_emoji() {
        let fetcher = Arc::new(MemoryFetcher::new());
        fetcher.set_json(
            INDEX,
            json!({
                "s1": "https://x/s1.json",
                "inline": {"wave": "https://img/wave.png"},
                "smile": {"alt": "Smile"}
            }),
        );
        let index = cache(&fetcher);
        smol::block_on(index.ensure_loaded()).unwrap();

        assert!(index.emoji("s1").is_none());
        assert!(index.emoji("inline").is_none());
        assert_eq!(index.emoji_names(), vec!["smile"]);
        assert!(index.lookup("s1").is_some());
    }

    #[test]
    fn test_no_index_url() {
        let fetcher = Arc::new(MemoryFetcher::new());
        let index = IndexCache::new(None, fetcher.clone(), defaults());
        assert_eq!(smol::block_on(index.ensure_loaded()), Err(ReplaceError::NoIndex));
        assert_eq!(fetcher.total_requests(), 0);
    }
}
