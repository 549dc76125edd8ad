//! Emoji Replacer
//!
//! Scans document text for emoji markers (`:smile:` or `[smile@set1]`) and
//! replaces them with images or trusted markup from remotely fetched JSON
//! indexes.
//!
//! # Example
//! ```rust,ignore
//! use emoji_replacer::{Config, EmojiEngine};
//! use emoji_net::{HttpConfig, HttpFetcher};
//!
//! let fetcher = Arc::new(HttpFetcher::new(HttpConfig::default())?);
//! let mut engine = EmojiEngine::new(Config::from_json(json)?, fetcher);
//! engine.init(&mut doc).await?;
//! engine.replace_all(&mut doc).await;
//! ```

mod config;
mod engine;
mod error;
mod flight;
mod index;
mod processed;
mod resolver;
mod rewriter;
mod sanitize;
mod scanner;
mod sets;
mod source;
mod watcher;

pub use config::{Config, Grammar, RescanStrategy, DEBOUNCE_RANGE_MS};
pub use engine::{EmojiEngine, ScanReport};
pub use error::{ReplaceError, ReplaceResult};
pub use flight::{FlightStats, SingleFlight};
pub use index::IndexCache;
pub use processed::ProcessedNodeSet;
pub use resolver::{Resolution, Resolver};
pub use rewriter::{render, render_image, rewrite, RenderOptions, Replacement, Rewriter};
pub use sanitize::{escape_text, sanitize};
pub use scanner::{
    Marker, MarkerKey, MarkerScanner, ScanOutcome, ScanRules, ScanUnit, UnitKind, EXCLUDED_TAGS,
};
pub use sets::SetCache;
pub use source::{
    normalize_entry, normalize_index, normalize_set, EmojiDescriptor, EmojiEntry, ImageDefaults,
    IndexEntry, IndexLocation, IndexSource, RenderSpec, ResolvedSet, SetSource,
};
pub use watcher::{Debouncer, MutationWatcher, RescanBatch};

// Re-export sub-crates for hosts
pub use emoji_dom as dom;
pub use emoji_html as html;
pub use emoji_net as net;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
