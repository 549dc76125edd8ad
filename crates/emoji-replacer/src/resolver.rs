//! Resolver
//!
//! Marker -> renderable entry. Resolution is total: any failure yields a
//! placeholder carrying the literal marker text.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;

use crate::error::{ReplaceError, ReplaceResult};
use crate::scanner::{Marker, MarkerKey};
use crate::sets::SetCache;
use crate::source::EmojiEntry;

/// Outcome of resolving one marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(EmojiEntry),
    /// Literal marker text, kept verbatim
    Placeholder(String),
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Resolves markers through the set cache
#[derive(Clone)]
pub struct Resolver {
    sets: SetCache,
    /// Set for markers without an explicit one
    default_set: Option<String>,
}

impl Resolver {
    pub fn new(sets: SetCache, default_set: Option<String>) -> Self {
        Self { sets, default_set }
    }

    /// Resolve one marker, falling back to its literal text
    pub async fn resolve(&self, object_id: &str, set_ref: Option<&str>, raw_text: &str) -> Resolution {
        match self.lookup(object_id, set_ref).await {
            Ok(entry) => Resolution::Found(entry),
            Err(err) => {
                tracing::warn!("Keeping {} as text: {}", raw_text, err);
                Resolution::Placeholder(raw_text.to_string())
            }
        }
    }

    /// Resolve one marker, reporting why it failed
    pub async fn lookup(&self, object_id: &str, set_ref: Option<&str>) -> ReplaceResult<EmojiEntry> {
        let index = self.sets.index();
        let Some(set_id) = set_ref.or(self.default_set.as_deref()) else {
            // No set at all: the index document itself maps names to entries
            index.ensure_loaded().await?;
            return index.emoji(object_id).ok_or_else(|| ReplaceError::NotFound {
                set: String::new(),
                object: object_id.to_string(),
            });
        };

        let set = self.sets.resolve_set(set_id).await?;
        set.get(object_id)
            .cloned()
            .ok_or_else(|| ReplaceError::NotFound {
                set: set_id.to_string(),
                object: object_id.to_string(),
            })
    }

    /// Resolve every distinct marker of a batch concurrently
    pub async fn resolve_batch(&self, markers: &[Marker]) -> HashMap<MarkerKey, Resolution> {
        let mut distinct: Vec<&Marker> = Vec::new();
        let mut keys = HashSet::new();
        for marker in markers {
            if keys.insert(marker.key()) {
                distinct.push(marker);
            }
        }
        tracing::debug!(
            "Resolving {} markers ({} distinct)",
            markers.len(),
            distinct.len()
        );

        let resolved = join_all(distinct.iter().map(|marker| async move {
            let resolution = self
                .resolve(&marker.object_id, marker.set_ref.as_deref(), &marker.raw_text)
                .await;
            (marker.key(), resolution)
        }))
        .await;
        resolved.into_iter().collect()
    }
}
