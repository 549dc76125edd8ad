//! DOM Rewriter
//!
//! Builds the replacement markup for a unit as a pure string operation, then
//! commits it in one step: a text unit is swapped for the parsed nodes, a
//! markup unit gets the parsed nodes as its new children.

use std::collections::HashMap;
use std::ops::Range;

use emoji_dom::{DomTree, NodeId};
use emoji_html::HtmlParser;

use crate::config::Config;
use crate::error::ReplaceResult;
use crate::resolver::Resolution;
use crate::sanitize::{escape_text, sanitize};
use crate::scanner::{MarkerKey, ScanUnit, UnitKind};
use crate::source::{EmojiEntry, RenderSpec};

/// Rendered content for one marker span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Markup inserted as is
    Markup(String),
    /// The marker text, kept unchanged
    Literal,
}

/// Image attributes taken from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub class_name: String,
    pub size: u32,
    pub lazy_load: bool,
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            class_name: config.class_name.clone(),
            size: config.size,
            lazy_load: config.lazy_load,
        }
    }
}

/// Render an image element for `entry`. If the image fails to load it is
/// replaced by the literal marker text.
pub fn render_image(url: &str, entry: &EmojiEntry, marker_text: &str, options: &RenderOptions) -> String {
    let label = sanitize(&entry.descriptor.display_label);
    let mut markup = format!(
        "<img class=\"{}\" src=\"{}\" alt=\"{}\" title=\"{}\" width=\"{}\" height=\"{}\"",
        sanitize(&options.class_name),
        sanitize(url),
        label,
        label,
        options.size,
        options.size,
    );
    if options.lazy_load {
        markup.push_str(" loading=\"lazy\"");
    }
    markup.push_str(&format!(
        " data-emoji-marker=\"{}\" onerror=\"this.replaceWith(this.dataset.emojiMarker)\">",
        sanitize(marker_text)
    ));
    markup
}

/// Markup for a resolved entry
pub fn render(entry: &EmojiEntry, marker_text: &str, options: &RenderOptions) -> String {
    match &entry.render {
        RenderSpec::Html { markup } => markup.clone(),
        RenderSpec::Image { url } => render_image(url, entry, marker_text, options),
    }
}

/// Rebuild `content` with each span replaced, in order. Untouched text of a
/// `Text` unit is escaped; `Markup` content is already markup.
pub fn rewrite(content: &str, kind: UnitKind, replacements: &[(Range<usize>, Replacement)]) -> String {
    let literal = |s: &str| match kind {
        UnitKind::Text => escape_text(s),
        UnitKind::Markup => s.to_string(),
    };

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for (span, replacement) in replacements {
        out.push_str(&literal(&content[last..span.start]));
        match replacement {
            Replacement::Markup(markup) => out.push_str(markup),
            Replacement::Literal => out.push_str(&literal(&content[span.clone()])),
        }
        last = span.end;
    }
    out.push_str(&literal(&content[last..]));
    out
}

/// Plans and commits unit rewrites
#[derive(Debug, Clone)]
pub struct Rewriter {
    options: RenderOptions,
    parser: HtmlParser,
}

impl Rewriter {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            parser: HtmlParser::new(),
        }
    }

    /// Replacements for a unit, or `None` when nothing resolved
    pub fn plan(
        &self,
        unit: &ScanUnit,
        resolved: &HashMap<MarkerKey, Resolution>,
    ) -> Option<Vec<(Range<usize>, Replacement)>> {
        let mut any_found = false;
        let replacements: Vec<(Range<usize>, Replacement)> = unit
            .markers
            .iter()
            .map(|marker| {
                let replacement = match resolved.get(&marker.key()) {
                    Some(Resolution::Found(entry)) => {
                        any_found = true;
                        Replacement::Markup(render(entry, &marker.raw_text, &self.options))
                    }
                    _ => Replacement::Literal,
                };
                (marker.range(), replacement)
            })
            .collect();
        any_found.then_some(replacements)
    }

    /// Swap the unit for `markup`. Returns every node created, or `None` if
    /// the unit changed since it was scanned.
    pub fn commit(
        &self,
        tree: &mut DomTree,
        unit: &ScanUnit,
        markup: &str,
    ) -> ReplaceResult<Option<Vec<NodeId>>> {
        if !self.is_current(tree, unit) {
            tracing::warn!("Unit {:?} changed before commit, skipped", unit.node);
            return Ok(None);
        }

        let nodes = self.parser.parse_fragment_into(tree, markup)?;
        match unit.kind {
            UnitKind::Text => tree.replace_with_nodes(unit.node, &nodes)?,
            UnitKind::Markup => tree.replace_children(unit.node, &nodes)?,
        }

        let created = nodes.iter().flat_map(|&n| tree.subtree(n)).collect();
        Ok(Some(created))
    }

    fn is_current(&self, tree: &DomTree, unit: &ScanUnit) -> bool {
        match unit.kind {
            UnitKind::Text => tree.text(unit.node) == Some(unit.content.as_str()),
            UnitKind::Markup => {
                tree.element(unit.node).is_some() && tree.inner_html(unit.node) == unit.content
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Marker;
    use crate::source::EmojiDescriptor;
    use emoji_dom::Document;

    fn options() -> RenderOptions {
        RenderOptions {
            class_name: "emoji-img".into(),
            size: 20,
            lazy_load: true,
        }
    }

    fn image_entry(id: &str, label: &str) -> EmojiEntry {
        EmojiEntry {
            descriptor: EmojiDescriptor {
                id: id.into(),
                display_label: label.into(),
                keywords: Vec::new(),
            },
            render: RenderSpec::Image {
                url: format!("https://img/{id}.png"),
            },
        }
    }

    fn marker_at(content: &str, raw: &str, set: Option<&str>, object: &str) -> Marker {
        let start = content.find(raw).unwrap();
        Marker {
            raw_text: raw.into(),
            object_id: object.into(),
            set_ref: set.map(str::to_string),
            start,
            len: raw.len(),
        }
    }

    #[test]
    fn test_render_image_attributes() {
        let markup = render_image(
            "https://img/smile.png",
            &image_entry("smile", "Smile \"big\""),
            ":smile:",
            &options(),
        );
        assert_eq!(
            markup,
            "<img class=\"emoji-img\" src=\"https://img/smile.png\" alt=\"Smile &quot;big&quot;\" \
             title=\"Smile &quot;big&quot;\" width=\"20\" height=\"20\" loading=\"lazy\" \
             data-emoji-marker=\":smile:\" onerror=\"this.replaceWith(this.dataset.emojiMarker)\">"
        );
    }

    #[test]
    fn test_render_without_lazy_load() {
        let mut opts = options();
        opts.lazy_load = false;
        let markup = render_image("u", &image_entry("a", "a"), ":a:", &opts);
        assert!(!markup.contains("loading"));
    }

    #[test]
    fn test_html_is_verbatim() {
        let entry = EmojiEntry {
            descriptor: EmojiDescriptor {
                id: "x".into(),
                display_label: "x".into(),
                keywords: Vec::new(),
            },
            render: RenderSpec::Html {
                markup: "<span class=\"e\">&#x1F600;</span>".into(),
            },
        };
        assert_eq!(render(&entry, ":x:", &options()), "<span class=\"e\">&#x1F600;</span>");
    }

    #[test]
    fn test_rewrite_text_unit_escapes_literals() {
        let content = "a < b :x: & :y:";
        let replacements = vec![
            (6..9, Replacement::Markup("<i>X</i>".into())),
            (12..15, Replacement::Literal),
        ];
        assert_eq!(
            rewrite(content, UnitKind::Text, &replacements),
            "a &lt; b <i>X</i> &amp; :y:"
        );
    }

    #[test]
    fn test_rewrite_markup_unit_keeps_markup() {
        let content = "<b>[a@s]</b> &amp; [b@s]";
        let replacements = vec![
            (3..8, Replacement::Markup("<i>A</i>".into())),
            (19..24, Replacement::Literal),
        ];
        assert_eq!(
            rewrite(content, UnitKind::Markup, &replacements),
            "<b><i>A</i></b> &amp; [b@s]"
        );
    }

    #[test]
    fn test_plan_all_placeholders_is_none() {
        let content = "[a@s] [b@s]";
        let unit = ScanUnit {
            node: Document::default().body().unwrap(),
            kind: UnitKind::Markup,
            content: content.into(),
            markers: vec![
                marker_at(content, "[a@s]", Some("s"), "a"),
                marker_at(content, "[b@s]", Some("s"), "b"),
            ],
        };
        let mut resolved = HashMap::new();
        resolved.insert(unit.markers[0].key(), Resolution::Placeholder("[a@s]".into()));
        resolved.insert(unit.markers[1].key(), Resolution::Placeholder("[b@s]".into()));

        let rewriter = Rewriter::new(options());
        assert!(rewriter.plan(&unit, &resolved).is_none());

        resolved.insert(unit.markers[1].key(), Resolution::Found(image_entry("b", "b")));
        let plan = rewriter.plan(&unit, &resolved).unwrap();
        assert_eq!(plan[0].1, Replacement::Literal);
        assert!(matches!(plan[1].1, Replacement::Markup(_)));
    }

    #[test]
    fn test_commit_text_unit() {
        let mut doc = Document::default();
        let body = doc.body().unwrap();
        let p = doc.tree_mut().create_element("p");
        let text = doc.tree_mut().create_text("hi :x: there");
        doc.tree_mut().append_child(body, p).unwrap();
        doc.tree_mut().append_child(p, text).unwrap();

        let unit = ScanUnit {
            node: text,
            kind: UnitKind::Text,
            content: "hi :x: there".into(),
            markers: vec![marker_at("hi :x: there", ":x:", None, "x")],
        };
        let rewriter = Rewriter::new(options());
        let created = rewriter
            .commit(doc.tree_mut(), &unit, "hi <b>X</b> there")
            .unwrap()
            .unwrap();

        assert_eq!(doc.tree().inner_html(p), "hi <b>X</b> there");
        assert!(!doc.tree().is_alive(text));
        // "hi ", <b>, "X", " there"
        assert_eq!(created.len(), 4);
    }

    #[test]
    fn test_commit_skips_stale_unit() {
        let mut doc = Document::default();
        let body = doc.body().unwrap();
        let text = doc.tree_mut().create_text(":x:");
        doc.tree_mut().append_child(body, text).unwrap();

        let unit = ScanUnit {
            node: text,
            kind: UnitKind::Text,
            content: ":x:".into(),
            markers: vec![marker_at(":x:", ":x:", None, "x")],
        };
        doc.tree_mut().set_text(text, "changed").unwrap();

        let rewriter = Rewriter::new(options());
        assert_eq!(rewriter.commit(doc.tree_mut(), &unit, "<b>X</b>").unwrap(), None);
        assert_eq!(doc.tree().inner_html(body), "changed");
    }
}
