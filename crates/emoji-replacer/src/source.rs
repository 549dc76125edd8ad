//! Source data normalization
//!
//! Index and set documents arrive in two shapes each: a sequence of records
//! or a flat mapping. Each document kind is tagged once (`ByArray` / `ByMap`)
//! and then normalized into one canonical form. A document that is neither
//! shape is a parse error; a single malformed entry is skipped.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{ReplaceError, ReplaceResult};

/// Identity and metadata of one emoji
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiDescriptor {
    pub id: String,
    pub display_label: String,
    pub keywords: Vec<String>,
}

/// Renderable form of one emoji
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSpec {
    /// Trusted markup from the data source, inserted verbatim
    Html { markup: String },
    Image { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmojiEntry {
    pub descriptor: EmojiDescriptor,
    pub render: RenderSpec,
}

/// All entries of one set, keyed by object id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSet {
    entries: HashMap<String, EmojiEntry>,
}

impl ResolvedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, object_id: &str) -> Option<&EmojiEntry> {
        self.entries.get(object_id)
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.entries.contains_key(object_id)
    }

    /// Insert or overwrite an entry
    pub fn insert(&mut self, entry: EmojiEntry) {
        self.entries.insert(entry.descriptor.id.clone(), entry);
    }

    /// Object ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a set's data lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLocation {
    Remote(String),
    /// Set data embedded directly in the index
    Inline(Arc<ResolvedSet>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub set_id: String,
    pub location: IndexLocation,
}

/// Image URL defaults for entries that only carry metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDefaults {
    pub base_url: String,
    pub format: String,
}

impl ImageDefaults {
    pub fn from_config(config: &Config) -> Self {
        Self {
            base_url: config.image_base_url.clone(),
            format: config.image_format.clone(),
        }
    }

    fn url_for(&self, id: &str) -> String {
        format!("{}{}.{}", self.base_url, id, self.format)
    }
}

/// Index document, tagged by shape
#[derive(Debug, Clone, PartialEq)]
pub enum IndexSource {
    /// `[{"id": ..., "url": ...}, ...]`
    ByArray(Vec<Value>),
    /// `{"set": "url" | inline set data, ...}`
    ByMap(Map<String, Value>),
}

impl IndexSource {
    pub fn from_value(value: Value) -> ReplaceResult<Self> {
        match value {
            Value::Array(items) => Ok(Self::ByArray(items)),
            Value::Object(map) => Ok(Self::ByMap(map)),
            other => Err(ReplaceError::Parse(format!(
                "index must be an array or object, got {}",
                kind_of(&other)
            ))),
        }
    }
}

/// Set document, tagged by shape
#[derive(Debug, Clone, PartialEq)]
pub enum SetSource {
    /// `[{"id": ..., "html"?: ..., "url"?: ..., "alt"?: ..., "keywords"?: [...]}, ...]`
    ByArray(Vec<Value>),
    /// `{"id": "url-or-markup" | {"html"?, "url"?, "alt"?, "keywords"?}, ...}`
    ByMap(Map<String, Value>),
}

impl SetSource {
    pub fn from_value(value: Value) -> ReplaceResult<Self> {
        match value {
            Value::Array(items) => Ok(Self::ByArray(items)),
            Value::Object(map) => Ok(Self::ByMap(map)),
            other => Err(ReplaceError::Parse(format!(
                "set must be an array or object, got {}",
                kind_of(&other)
            ))),
        }
    }
}

/// Normalize an index document into set id -> entry
pub fn normalize_index(
    source: IndexSource,
    defaults: &ImageDefaults,
) -> HashMap<String, IndexEntry> {
    let mut index = HashMap::new();
    match source {
        IndexSource::ByArray(items) => {
            for item in items {
                let id = item.get("id").and_then(Value::as_str);
                let url = item.get("url").and_then(Value::as_str);
                match (id, url) {
                    (Some(id), Some(url)) if !id.is_empty() => {
                        index.entry(id.to_string()).or_insert_with(|| IndexEntry {
                            set_id: id.to_string(),
                            location: IndexLocation::Remote(url.to_string()),
                        });
                    }
                    _ => tracing::debug!("Skipping malformed index record: {}", item),
                }
            }
        }
        IndexSource::ByMap(map) => {
            for (id, value) in map {
                let location = match value {
                    Value::String(url) => IndexLocation::Remote(url),
                    data @ (Value::Object(_) | Value::Array(_)) => {
                        let set = SetSource::from_value(data)
                            .map(|source| normalize_set(source, defaults));
                        match set {
                            Ok(set) => IndexLocation::Inline(Arc::new(set)),
                            Err(_) => continue,
                        }
                    }
                    other => {
                        tracing::debug!("Skipping index entry {} ({})", id, kind_of(&other));
                        continue;
                    }
                };
                index.insert(id.clone(), IndexEntry { set_id: id, location });
            }
        }
    }
    index
}

/// Normalize a set document
pub fn normalize_set(source: SetSource, defaults: &ImageDefaults) -> ResolvedSet {
    let mut set = ResolvedSet::new();
    match source {
        SetSource::ByArray(items) => {
            for item in items {
                let Some(id) = item.get("id").and_then(Value::as_str) else {
                    tracing::debug!("Skipping set record without id: {}", item);
                    continue;
                };
                // First record wins for duplicate ids
                if set.contains(id) {
                    continue;
                }
                if let Some(entry) = normalize_entry(id, &item, defaults) {
                    set.insert(entry);
                }
            }
        }
        SetSource::ByMap(map) => {
            for (id, value) in &map {
                if let Some(entry) = normalize_entry(id, value, defaults) {
                    set.insert(entry);
                }
            }
        }
    }
    set
}

/// Normalize one entry value (string or object) for `id`
pub fn normalize_entry(id: &str, value: &Value, defaults: &ImageDefaults) -> Option<EmojiEntry> {
    if id.is_empty() {
        return None;
    }
    let (render, label, keywords) = match value {
        Value::String(raw) => (render_from_str(raw), None, Vec::new()),
        Value::Object(fields) => {
            let label = fields.get("alt").and_then(Value::as_str).map(str::to_string);
            let keywords: Vec<String> = fields
                .get("keywords")
                .and_then(Value::as_array)
                .map(|words| {
                    words
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();

            let render = if let Some(markup) = fields.get("html").and_then(Value::as_str) {
                RenderSpec::Html {
                    markup: markup.to_string(),
                }
            } else if let Some(url) = fields.get("url").and_then(Value::as_str) {
                RenderSpec::Image {
                    url: url.to_string(),
                }
            } else if label.is_some() || fields.contains_key("keywords") {
                RenderSpec::Image {
                    url: defaults.url_for(id),
                }
            } else {
                tracing::debug!("Skipping entry {} without html, url or metadata", id);
                return None;
            };
            (render, label, keywords)
        }
        other => {
            tracing::debug!("Skipping entry {} ({})", id, kind_of(other));
            return None;
        }
    };

    Some(EmojiEntry {
        descriptor: EmojiDescriptor {
            id: id.to_string(),
            display_label: label.unwrap_or_else(|| id.to_string()),
            keywords,
        },
        render,
    })
}

/// A raw string is markup when it is wrapped in angle brackets
fn render_from_str(raw: &str) -> RenderSpec {
    let trimmed = raw.trim();
    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        RenderSpec::Html {
            markup: raw.to_string(),
        }
    } else {
        RenderSpec::Image {
            url: raw.to_string(),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
