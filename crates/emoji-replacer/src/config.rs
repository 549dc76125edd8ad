//! Engine configuration
//!
//! Deserializable from partial JSON; every missing field takes its default.

use serde::Deserialize;

use crate::error::{ReplaceError, ReplaceResult};

/// Shortest and longest allowed debounce quiet window, in milliseconds
pub const DEBOUNCE_RANGE_MS: (u64, u64) = (100, 300);

/// Marker dialect an engine instance scans for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grammar {
    /// `:name:`, resolved against the default set
    Flat,
    /// `[object@set]`
    #[default]
    Scoped,
}

/// What a mutation-triggered pass rescans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescanStrategy {
    /// Only the subtrees added since the last pass
    #[default]
    AddedNodes,
    /// The whole observed root (processed text is still skipped)
    WholeRoot,
}

/// Replacer configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the set index is fetched from
    pub index_url: Option<String>,
    /// Base for image URLs of entries that only carry metadata
    pub image_base_url: String,
    pub image_format: String,
    pub class_name: String,
    /// Width and height of emitted images, in pixels
    pub size: u32,
    pub lazy_load: bool,
    pub observe_changes: bool,
    pub grammar: Grammar,
    /// Set used to resolve flat markers
    pub default_set: Option<String>,
    /// Restrict scanning to text below these tags
    pub scan_tags: Option<Vec<String>>,
    pub ignore_class: String,
    pub debounce_ms: u64,
    pub rescan: RescanStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: None,
            image_base_url: "https://cdn.example.com/emoji/".into(),
            image_format: "png".into(),
            class_name: "emoji-img".into(),
            size: 20,
            lazy_load: true,
            observe_changes: true,
            grammar: Grammar::default(),
            default_set: None,
            scan_tags: None,
            ignore_class: "no-emoji".into(),
            debounce_ms: DEBOUNCE_RANGE_MS.0,
            rescan: RescanStrategy::default(),
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON configuration
    pub fn from_json(json: &str) -> ReplaceResult<Self> {
        let config: Config =
            serde_json::from_str(json).map_err(|e| ReplaceError::Parse(format!("config: {e}")))?;
        Ok(config.normalized())
    }

    /// Clamp and lowercase fields that must stay within bounds
    pub fn normalized(mut self) -> Self {
        self.debounce_ms = self.debounce_ms.clamp(DEBOUNCE_RANGE_MS.0, DEBOUNCE_RANGE_MS.1);
        if let Some(tags) = &mut self.scan_tags {
            for tag in tags.iter_mut() {
                *tag = tag.to_ascii_lowercase();
            }
        }
        self
    }

    pub fn with_index_url(mut self, url: &str) -> Self {
        self.index_url = Some(url.to_string());
        self
    }

    pub fn with_grammar(mut self, grammar: Grammar) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn with_default_set(mut self, set_id: &str) -> Self {
        self.default_set = Some(set_id.to_string());
        self
    }
}
