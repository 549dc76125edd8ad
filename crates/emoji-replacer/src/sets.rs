//! Set Cache
//!
//! Set id -> resolved set, filled on first reference. Fills are
//! single-flight per set id, failures are not cached, and a fill that was in
//! flight when its key got invalidated does not store its result.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use emoji_net::Fetcher;

use crate::error::{ReplaceError, ReplaceResult};
use crate::flight::SingleFlight;
use crate::index::IndexCache;
use crate::source::{
    normalize_entry, normalize_set, EmojiEntry, ImageDefaults, IndexLocation, ResolvedSet,
    SetSource,
};

#[derive(Default)]
struct SetState {
    sets: HashMap<String, Arc<ResolvedSet>>,
    /// Per-key invalidation counter
    generations: HashMap<String, u64>,
    /// Whole-cache invalidation counter
    epoch: u64,
}

impl SetState {
    fn stamp(&self, set_id: &str) -> (u64, u64) {
        (self.epoch, self.generations.get(set_id).copied().unwrap_or(0))
    }
}

struct SetInner {
    fetcher: Arc<dyn Fetcher>,
    index: IndexCache,
    defaults: ImageDefaults,
    state: Mutex<SetState>,
    flight: SingleFlight<String, Arc<ResolvedSet>>,
}

/// Shared handle to the set cache
#[derive(Clone)]
pub struct SetCache {
    inner: Arc<SetInner>,
}

impl SetCache {
    pub fn new(fetcher: Arc<dyn Fetcher>, index: IndexCache, defaults: ImageDefaults) -> Self {
        Self {
            inner: Arc::new(SetInner {
                fetcher,
                index,
                defaults,
                state: Mutex::new(SetState::default()),
                flight: SingleFlight::new(),
            }),
        }
    }

    /// Cached set, or load it through the index
    pub async fn resolve_set(&self, set_id: &str) -> ReplaceResult<Arc<ResolvedSet>> {
        let stamp = {
            let state = self.inner.state.lock().unwrap();
            if let Some(set) = state.sets.get(set_id) {
                return Ok(Arc::clone(set));
            }
            state.stamp(set_id)
        };

        let inner = Arc::clone(&self.inner);
        let key = set_id.to_string();
        self.inner
            .flight
            .run(key.clone(), move || fill(inner, key, stamp))
            .await
    }

    /// Cached set without loading
    pub fn get(&self, set_id: &str) -> Option<Arc<ResolvedSet>> {
        self.inner.state.lock().unwrap().sets.get(set_id).cloned()
    }

    pub fn entry(&self, set_id: &str, object_id: &str) -> Option<EmojiEntry> {
        self.get(set_id).and_then(|set| set.get(object_id).cloned())
    }

    pub fn contains(&self, set_id: &str, object_id: &str) -> bool {
        self.get(set_id).is_some_and(|set| set.contains(object_id))
    }

    /// Object ids of a cached set
    pub fn list(&self, set_id: &str) -> Option<Vec<String>> {
        self.get(set_id).map(|set| set.ids())
    }

    /// Ids of all cached sets, sorted
    pub fn cached_sets(&self) -> Vec<String> {
        let state = self.inner.state.lock().unwrap();
        let mut ids: Vec<String> = state.sets.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Add or overwrite one entry, creating the set if it is not cached.
    ///
    /// `data` takes any form a set document entry may take.
    pub fn insert_entry(
        &self,
        set_id: &str,
        object_id: &str,
        data: &serde_json::Value,
    ) -> ReplaceResult<()> {
        let entry = normalize_entry(object_id, data, &self.inner.defaults).ok_or_else(|| {
            ReplaceError::Parse(format!("unusable data for [{object_id}@{set_id}]"))
        })?;

        let mut state = self.inner.state.lock().unwrap();
        let set = state.sets.entry(set_id.to_string()).or_default();
        Arc::make_mut(set).insert(entry);
        tracing::debug!("Inserted [{}@{}]", object_id, set_id);
        Ok(())
    }

    /// Drop one cached set, or all of them
    pub fn invalidate(&self, set_id: Option<&str>) {
        let mut state = self.inner.state.lock().unwrap();
        match set_id {
            Some(id) => {
                state.sets.remove(id);
                *state.generations.entry(id.to_string()).or_insert(0) += 1;
                self.inner.flight.forget(Some(&id.to_string()));
                tracing::info!("Invalidated set {}", id);
            }
            None => {
                state.sets.clear();
                state.generations.clear();
                state.epoch += 1;
                self.inner.flight.forget(None);
                tracing::info!("Invalidated all sets");
            }
        }
    }

    pub fn index(&self) -> &IndexCache {
        &self.inner.index
    }
}

async fn fill(
    inner: Arc<SetInner>,
    set_id: String,
    stamp: (u64, u64),
) -> ReplaceResult<Arc<ResolvedSet>> {
    let loaded = load(&inner, &set_id).await.inspect_err(|err| {
        tracing::warn!("Failed to load emoji set {}: {}", set_id, err);
    })?;

    let mut state = inner.state.lock().unwrap();
    if state.stamp(&set_id) != stamp {
        tracing::debug!("Set {} invalidated during load, result not stored", set_id);
        return Ok(loaded);
    }

    // Entries inserted by hand while the fill was running take precedence
    let merged = match state.sets.get(&set_id) {
        Some(existing) => {
            let mut merged = (*loaded).clone();
            for id in existing.ids() {
                if let Some(entry) = existing.get(&id) {
                    merged.insert(entry.clone());
                }
            }
            Arc::new(merged)
        }
        None => loaded,
    };
    state.sets.insert(set_id.clone(), Arc::clone(&merged));
    tracing::info!("Loaded emoji set {}: {} entries", set_id, merged.len());
    Ok(merged)
}

async fn load(inner: &SetInner, set_id: &str) -> ReplaceResult<Arc<ResolvedSet>> {
    inner.index.ensure_loaded().await?;
    let entry = inner
        .index
        .lookup(set_id)
        .ok_or_else(|| ReplaceError::UnknownSet(set_id.to_string()))?;

    match entry.location {
        IndexLocation::Inline(set) => Ok(set),
        IndexLocation::Remote(url) => {
            tracing::debug!("Fetching set {} from {}", set_id, url);
            let response = inner.fetcher.fetch_ok(&url).await?;
            let value: serde_json::Value = serde_json::from_slice(&response.body)?;
            let source = SetSource::from_value(value)?;
            Ok(Arc::new(normalize_set(source, &inner.defaults)))
        }
    }
}
