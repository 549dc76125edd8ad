//! Document - High-level document API

use crate::{DomResult, DomTree, NodeId};

/// HTML Document
#[derive(Debug)]
pub struct Document {
    tree: DomTree,
    url: String,
    html_element: Option<NodeId>,
    head_element: Option<NodeId>,
    body_element: Option<NodeId>,
}

impl Document {
    /// Create a document with the html/head/body skeleton
    pub fn new(url: &str) -> Self {
        let mut tree = DomTree::new();
        let (html, head, body) =
            build_skeleton(&mut tree).expect("skeleton nodes are detached elements under an empty root");

        Self {
            tree,
            url: url.to_string(),
            html_element: Some(html),
            head_element: Some(head),
            body_element: Some(body),
        }
    }

    /// Wrap an already built tree, locating html/head/body
    pub fn from_tree(tree: DomTree, url: &str) -> Self {
        let mut doc = Self {
            tree,
            url: url.to_string(),
            html_element: None,
            head_element: None,
            body_element: None,
        };
        doc.finalize();
        doc
    }

    fn finalize(&mut self) {
        let root = self.tree.root();
        self.html_element = self
            .tree
            .children(root)
            .find(|&id| self.tree.tag_name(id) == Some("html"));
        if let Some(html) = self.html_element {
            self.head_element = self
                .tree
                .children(html)
                .find(|&id| self.tree.tag_name(id) == Some("head"));
            self.body_element = self
                .tree
                .children(html)
                .find(|&id| self.tree.tag_name(id) == Some("body"));
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Text of the first `<title>` in `<head>`
    pub fn title(&self) -> String {
        self.head_element
            .and_then(|head| {
                self.tree
                    .children(head)
                    .find(|&id| self.tree.tag_name(id) == Some("title"))
            })
            .map(|title| self.tree.text_content(title))
            .unwrap_or_default()
    }

    pub fn document_element(&self) -> Option<NodeId> {
        self.html_element
    }

    pub fn head(&self) -> Option<NodeId> {
        self.head_element
    }

    pub fn body(&self) -> Option<NodeId> {
        self.body_element
    }

    /// Find an element by its id attribute
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.tree
            .subtree(self.tree.root())
            .into_iter()
            .find(|&node| {
                self.tree
                    .element(node)
                    .and_then(|e| e.get_attr("id"))
                    == Some(id)
            })
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }
}

fn build_skeleton(tree: &mut DomTree) -> DomResult<(NodeId, NodeId, NodeId)> {
    let html = tree.create_element("html");
    let head = tree.create_element("head");
    let body = tree.create_element("body");

    let root = tree.root();
    tree.append_child(root, html)?;
    tree.append_child(html, head)?;
    tree.append_child(html, body)?;
    Ok((html, head, body))
}

impl Default for Document {
    fn default() -> Self {
        Self::new("about:blank")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton() {
        let doc = Document::new("https://example.com/");
        let body = doc.body().unwrap();
        assert_eq!(doc.tree().tag_name(body), Some("body"));
        assert_eq!(doc.tree().parent(body), doc.document_element());
        assert_eq!(doc.url(), "https://example.com/");

        let html = doc.document_element().unwrap();
        let children: Vec<NodeId> = doc.tree().children(html).collect();
        assert_eq!(children, vec![doc.head().unwrap(), body]);
        assert_eq!(doc.tree().parent(html), Some(doc.tree().root()));
    }

    #[test]
    fn test_get_element_by_id() {
        let mut doc = Document::default();
        let body = doc.body().unwrap();
        let tree = doc.tree_mut();
        let p = tree.create_element_with_attrs("p", &[("id", "intro")]);
        tree.append_child(body, p).unwrap();

        assert_eq!(doc.get_element_by_id("intro"), Some(p));
        assert_eq!(doc.get_element_by_id("missing"), None);
    }
}
