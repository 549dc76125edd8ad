//! Marker Scanner
//!
//! Finds markers in a subtree without touching it. The flat grammar yields
//! one unit per text node. The scoped grammar yields one unit per element,
//! scanning its serialized inner markup but only accepting matches that lie
//! inside the serialized form of a single eligible text node.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use emoji_dom::{DomTree, NodeId, TextSpan};
use regex::Regex;

use crate::config::{Config, Grammar};
use crate::processed::ProcessedNodeSet;

/// Tags whose content is never scanned: script-like containers and elements
/// whose content is plain text
pub const EXCLUDED_TAGS: &[&str] = &[
    "script", "style", "iframe", "noscript", "textarea", "title", "xmp", "noembed",
    "noframes", "plaintext",
];

static FLAT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":([a-zA-Z0-9_+-]+):").expect("flat marker pattern"));
static SCOPED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^@\]]+)@([^\]]+)\]").expect("scoped marker pattern"));

/// One marker occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub raw_text: String,
    pub object_id: String,
    /// Explicit set (scoped grammar only)
    pub set_ref: Option<String>,
    /// Byte offset in the unit content
    pub start: usize,
    pub len: usize,
}

impl Marker {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.len
    }

    /// Resolution key; equal keys resolve to the same result
    pub fn key(&self) -> MarkerKey {
        (self.object_id.clone(), self.set_ref.clone())
    }
}

pub type MarkerKey = (String, Option<String>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Literal text of one text node
    Text,
    /// Serialized inner markup of one element
    Markup,
}

/// A piece of content to rewrite as a whole
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanUnit {
    /// Text node (`Text`) or element (`Markup`)
    pub node: NodeId,
    pub kind: UnitKind,
    pub content: String,
    /// Left to right, non-overlapping
    pub markers: Vec<Marker>,
}

/// Result of scanning one or more roots
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub units: Vec<ScanUnit>,
    /// Every eligible text node visited, with or without markers
    pub scanned: Vec<NodeId>,
}

impl ScanOutcome {
    pub fn marker_count(&self) -> usize {
        self.units.iter().map(|u| u.markers.len()).sum()
    }
}

/// Which text is eligible for scanning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRules {
    pub ignore_class: String,
    pub scan_tags: Option<Vec<String>>,
}

impl ScanRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            ignore_class: config.ignore_class.clone(),
            scan_tags: config.scan_tags.clone(),
        }
    }
}

/// Grammar-specific marker scanner
#[derive(Debug, Clone)]
pub struct MarkerScanner {
    grammar: Grammar,
    pattern: &'static Regex,
    rules: ScanRules,
}

impl MarkerScanner {
    pub fn new(grammar: Grammar, rules: ScanRules) -> Self {
        let pattern: &'static Regex = match grammar {
            Grammar::Flat => &FLAT_PATTERN,
            Grammar::Scoped => &SCOPED_PATTERN,
        };
        Self {
            grammar,
            pattern,
            rules,
        }
    }

    pub fn grammar(&self) -> Grammar {
        self.grammar
    }

    /// All markers in `text`, left to right
    pub fn scan_text(&self, text: &str) -> Vec<Marker> {
        self.pattern
            .captures_iter(text)
            .filter_map(|cap| {
                let full = cap.get(0)?;
                let object = cap.get(1)?;
                let set_ref = match self.grammar {
                    Grammar::Flat => None,
                    Grammar::Scoped => Some(cap.get(2)?.as_str().to_string()),
                };
                Some(Marker {
                    raw_text: full.as_str().to_string(),
                    object_id: object.as_str().to_string(),
                    set_ref,
                    start: full.start(),
                    len: full.len(),
                })
            })
            .collect()
    }

    /// Scan the subtrees of `roots`, skipping processed text
    pub fn scan(
        &self,
        tree: &DomTree,
        roots: &[NodeId],
        processed: &ProcessedNodeSet,
    ) -> ScanOutcome {
        let mut seen = HashSet::new();
        let mut scanned = Vec::new();
        for &root in roots {
            for node in tree.subtree(root) {
                if tree.text(node).is_none() || processed.contains(node) || !seen.insert(node) {
                    continue;
                }
                if self.is_eligible(tree, node) {
                    scanned.push(node);
                }
            }
        }

        let units = match self.grammar {
            Grammar::Flat => self.text_units(tree, &scanned),
            Grammar::Scoped => self.markup_units(tree, &scanned),
        };
        tracing::debug!(
            "Scanned {} text nodes, {} units with markers",
            scanned.len(),
            units.len()
        );
        ScanOutcome { units, scanned }
    }

    /// Whether a text node may be scanned, judged by its ancestor chain
    fn is_eligible(&self, tree: &DomTree, text: NodeId) -> bool {
        let Some(parent) = tree.parent(text) else {
            return false;
        };
        if tree.element(parent).is_none() {
            return false;
        }

        let mut in_scan_tags = self.rules.scan_tags.is_none();
        for ancestor in std::iter::once(parent).chain(tree.ancestors(parent)) {
            let Some(elem) = tree.element(ancestor) else {
                continue;
            };
            if EXCLUDED_TAGS.contains(&elem.tag.as_str())
                || (!self.rules.ignore_class.is_empty() && elem.has_class(&self.rules.ignore_class))
            {
                return false;
            }
            if let Some(tags) = &self.rules.scan_tags {
                in_scan_tags |= tags.iter().any(|t| *t == elem.tag);
            }
        }
        in_scan_tags
    }

    /// Markers inside one text span of serialized markup, in markup offsets
    fn scan_span(&self, markup: &str, span: &TextSpan) -> Vec<Marker> {
        let mut markers = self.scan_text(&markup[span.range.clone()]);
        for marker in &mut markers {
            marker.start += span.range.start;
        }
        markers
    }

    fn text_units(&self, tree: &DomTree, texts: &[NodeId]) -> Vec<ScanUnit> {
        texts
            .iter()
            .filter_map(|&node| {
                let text = tree.text(node)?;
                let markers = self.scan_text(text);
                (!markers.is_empty()).then(|| ScanUnit {
                    node,
                    kind: UnitKind::Text,
                    content: text.to_string(),
                    markers,
                })
            })
            .collect()
    }

    fn markup_units(&self, tree: &DomTree, texts: &[NodeId]) -> Vec<ScanUnit> {
        // Text nodes whose serialized form holds at least one marker
        let mut hits = HashSet::new();
        let mut elements = Vec::new();
        for &node in texts {
            let Some(parent) = tree.parent(node) else {
                continue;
            };
            let serialized = tree.outer_html(node);
            if self.pattern.is_match(&serialized) {
                hits.insert(node);
                if !elements.contains(&parent) {
                    elements.push(parent);
                }
            }
        }

        // Nested units collapse into the outermost one
        let outermost: Vec<NodeId> = elements
            .iter()
            .copied()
            .filter(|&el| {
                !elements
                    .iter()
                    .any(|&other| other != el && tree.contains(other, el))
            })
            .collect();

        outermost
            .into_iter()
            .filter_map(|element| {
                let serialized = tree.serialize_children(element);
                let markers: Vec<Marker> = serialized
                    .text_spans
                    .iter()
                    .filter(|span| hits.contains(&span.node))
                    .flat_map(|span| self.scan_span(&serialized.markup, span))
                    .collect();
                (!markers.is_empty()).then(|| ScanUnit {
                    node: element,
                    kind: UnitKind::Markup,
                    content: serialized.markup,
                    markers,
                })
            })
            .collect()
    }
}
