//! HTML serialization
//!
//! Follows the HTML fragment serialization rules closely enough to round-trip
//! through the parser. `serialize_children` additionally reports where each
//! text node's (escaped) content landed in the output.

use std::ops::Range;

use crate::{DomTree, NodeData, NodeId, RAW_TEXT_ELEMENTS, VOID_ELEMENTS};

/// Serialized inner markup plus the location of every text node in it
#[derive(Debug, Clone, Default)]
pub struct Serialized {
    pub markup: String,
    pub text_spans: Vec<TextSpan>,
}

/// Byte range of one text node inside serialized markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    pub node: NodeId,
    pub range: Range<usize>,
}

/// Escape text node content
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape an attribute value (double-quoted)
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
    out
}

impl DomTree {
    /// Serialize the children of `id`
    pub fn inner_html(&self, id: NodeId) -> String {
        self.serialize_children(id).markup
    }

    /// Serialize `id` itself and its subtree
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = Serialized::default();
        self.write_node(id, &mut out);
        out.markup
    }

    /// Serialize the children of `id`, tracking text node spans
    pub fn serialize_children(&self, id: NodeId) -> Serialized {
        let mut out = Serialized::default();
        for child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, id: NodeId, out: &mut Serialized) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.data {
            NodeData::Document => {
                for child in self.children(id) {
                    self.write_node(child, out);
                }
            }
            NodeData::Doctype { name } => {
                out.markup.push_str("<!DOCTYPE ");
                out.markup.push_str(name);
                out.markup.push('>');
            }
            NodeData::Comment(text) => {
                out.markup.push_str("<!--");
                out.markup.push_str(text);
                out.markup.push_str("-->");
            }
            NodeData::Text(text) => {
                let raw = self
                    .parent(id)
                    .and_then(|p| self.tag_name(p))
                    .is_some_and(|tag| RAW_TEXT_ELEMENTS.contains(&tag));
                let start = out.markup.len();
                if raw {
                    out.markup.push_str(text);
                } else {
                    out.markup.push_str(&escape_text(text));
                }
                out.text_spans.push(TextSpan {
                    node: id,
                    range: start..out.markup.len(),
                });
            }
            NodeData::Element(elem) => {
                out.markup.push('<');
                out.markup.push_str(&elem.tag);
                for attr in &elem.attrs {
                    out.markup.push(' ');
                    out.markup.push_str(&attr.name);
                    out.markup.push_str("=\"");
                    out.markup.push_str(&escape_attr(&attr.value));
                    out.markup.push('"');
                }
                out.markup.push('>');
                if VOID_ELEMENTS.contains(&elem.tag.as_str()) {
                    return;
                }
                for child in self.children(id) {
                    self.write_node(child, out);
                }
                out.markup.push_str("</");
                out.markup.push_str(&elem.tag);
                out.markup.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_with_spans() {
        let mut tree = DomTree::new();
        let p = tree.create_element_with_attrs("p", &[("class", "a\"b")]);
        let t1 = tree.create_text("x < y ");
        let img = tree.create_element_with_attrs("img", &[("src", "s.png")]);
        let t2 = tree.create_text("[a@b]");
        tree.append_child(tree.root(), p).unwrap();
        tree.append_child(p, t1).unwrap();
        tree.append_child(p, img).unwrap();
        tree.append_child(p, t2).unwrap();

        assert_eq!(
            tree.outer_html(p),
            "<p class=\"a&quot;b\">x &lt; y <img src=\"s.png\">[a@b]</p>"
        );

        let inner = tree.serialize_children(p);
        assert_eq!(inner.markup, "x &lt; y <img src=\"s.png\">[a@b]");
        assert_eq!(inner.text_spans.len(), 2);
        assert_eq!(&inner.markup[inner.text_spans[0].range.clone()], "x &lt; y ");
        assert_eq!(&inner.markup[inner.text_spans[1].range.clone()], "[a@b]");
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let mut tree = DomTree::new();
        let script = tree.create_element("script");
        let code = tree.create_text("if (a < b) {}");
        tree.append_child(tree.root(), script).unwrap();
        tree.append_child(script, code).unwrap();

        assert_eq!(tree.outer_html(script), "<script>if (a < b) {}</script>");
    }
}
