//! HTML5 Parser implementation
//!
//! Uses html5ever's RcDom and converts it into the arena DOM.

use emoji_dom::{Document, DomTree, NodeId};
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData as RcNodeData, RcDom};

use crate::ParseError;

/// HTML5 parser
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse HTML string into a Document
    pub fn parse(&self, html: &str) -> Result<Document, ParseError> {
        self.parse_with_url(html, "about:blank")
    }

    /// Parse HTML with a base URL
    pub fn parse_with_url(&self, html: &str, url: &str) -> Result<Document, ParseError> {
        tracing::debug!("Parsing HTML document: {}", url);

        let dom = Self::read(html)?;
        let mut tree = DomTree::new();
        let root = tree.root();
        for child in dom.document.children.borrow().iter() {
            if let Some(id) = self.convert_node(child, &mut tree)? {
                tree.append_child(root, id)?;
            }
        }

        let document = Document::from_tree(tree, url);
        tracing::debug!("Parsed {} nodes", document.tree().len());
        Ok(document)
    }

    /// Parse markup in body context into detached nodes owned by `tree`.
    ///
    /// The returned top-level nodes are in document order and ready to be
    /// spliced in with `replace_with_nodes` or `replace_children`.
    pub fn parse_fragment_into(
        &self,
        tree: &mut DomTree,
        markup: &str,
    ) -> Result<Vec<NodeId>, ParseError> {
        let wrapped = format!("<!DOCTYPE html><html><head></head><body>{markup}</body></html>");
        let dom = Self::read(&wrapped)?;

        let Some(body) = find_element(&dom.document, "body") else {
            return Ok(Vec::new());
        };

        let mut nodes = Vec::new();
        for child in body.children.borrow().iter() {
            if let Some(id) = self.convert_node(child, tree)? {
                nodes.push(id);
            }
        }
        Ok(nodes)
    }

    fn read(html: &str) -> Result<RcDom, ParseError> {
        let dom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .read_from(&mut html.as_bytes())?;
        Ok(dom)
    }

    /// Convert an RcDom node (and its children) into a detached arena node
    fn convert_node(&self, handle: &Handle, tree: &mut DomTree) -> Result<Option<NodeId>, ParseError> {
        let id = match &handle.data {
            RcNodeData::Doctype { name, .. } => tree.create_doctype(&name.to_string()),
            RcNodeData::Text { contents } => tree.create_text(&contents.borrow().to_string()),
            RcNodeData::Comment { contents } => tree.create_comment(&contents.to_string()),
            RcNodeData::Element { name, attrs, .. } => {
                let id = tree.create_element(&name.local);
                if let Some(elem) = tree.element_mut(id) {
                    for attr in attrs.borrow().iter() {
                        elem.set_attr(&attr.name.local, &attr.value);
                    }
                }
                for child in handle.children.borrow().iter() {
                    if let Some(child_id) = self.convert_node(child, tree)? {
                        tree.append_child(id, child_id)?;
                    }
                }
                id
            }
            RcNodeData::Document | RcNodeData::ProcessingInstruction { .. } => return Ok(None),
        };
        Ok(Some(id))
    }
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let RcNodeData::Element { name, .. } = &handle.data {
        if &*name.local == tag {
            return Some(handle.clone());
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}
