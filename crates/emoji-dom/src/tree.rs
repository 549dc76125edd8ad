//! DOM Tree (generational arena)
//!
//! Freed slots are recycled with a bumped generation. Every structural
//! change under the observed root is reported as a child-list record.

use crate::{ElementData, MutationObserver, MutationRecord, Node, NodeData, NodeId};

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    #[error("Node not found")]
    NotFound,
    #[error("Hierarchy request error")]
    HierarchyRequest,
    #[error("Node is not a child")]
    NotAChild,
    #[error("Invalid node type")]
    InvalidNodeType,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-based DOM tree
#[derive(Debug)]
pub struct DomTree {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    root: NodeId,
    live: usize,
    observer: MutationObserver,
}

impl DomTree {
    /// Create a tree holding only the document node
    pub fn new() -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            live: 0,
            observer: MutationObserver::new(),
        };
        tree.root = tree.alloc(NodeData::Document);
        tree
    }

    /// Document node
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(Node::new(data));
            NodeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(Node::new(data)),
            });
            NodeId::new(index, 0)
        }
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    /// Whether the id still refers to a live node
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_element_with_attrs(&mut self, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let mut elem = ElementData::new(tag);
        for (name, value) in attrs {
            elem.set_attr(name, value);
        }
        self.alloc(NodeData::Element(elem))
    }

    pub fn create_text(&mut self, content: &str) -> NodeId {
        self.alloc(NodeData::Text(content.to_string()))
    }

    pub fn create_comment(&mut self, content: &str) -> NodeId {
        self.alloc(NodeData::Comment(content.to_string()))
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.alloc(NodeData::Doctype {
            name: name.to_string(),
        })
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    /// Iterate over direct children
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.get(id).and_then(|n| n.first_child), move |&child| {
            self.get(child).and_then(|n| n.next_sibling)
        })
    }

    /// Iterate over ancestors, nearest first (excluding the node itself)
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// Pre-order list of the subtree rooted at `id`, including `id`
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let children: Vec<NodeId> = self.children(current).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Whether `node` is `ancestor` or lies below it
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id).and_then(Node::as_element)
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        self.get_mut(id).and_then(Node::as_element_mut)
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(Node::as_text)
    }

    /// Replace the content of a text node
    pub fn set_text(&mut self, id: NodeId, content: &str) -> DomResult<()> {
        match self.get_mut(id).map(|n| &mut n.data) {
            Some(NodeData::Text(text)) => {
                *text = content.to_string();
                Ok(())
            }
            Some(_) => Err(DomError::InvalidNodeType),
            None => Err(DomError::NotFound),
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        self.subtree(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    /// Append a child node (moving it if already attached)
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` before `reference`, or at the end when `reference` is None
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> DomResult<()> {
        self.check_insert(parent, child)?;
        if let Some(r) = reference {
            if self.parent(r) != Some(parent) {
                return Err(DomError::NotAChild);
            }
            if r == child {
                return Ok(());
            }
        }

        if let Some(old_parent) = self.unlink(child) {
            self.record(old_parent, Vec::new(), vec![child]);
        }
        self.link_before(parent, child, reference);
        self.record(parent, vec![child], Vec::new());
        Ok(())
    }

    /// Detach a node without freeing it
    pub fn detach(&mut self, id: NodeId) -> DomResult<()> {
        if !self.is_alive(id) {
            return Err(DomError::NotFound);
        }
        if let Some(parent) = self.unlink(id) {
            self.record(parent, Vec::new(), vec![id]);
        }
        Ok(())
    }

    /// Detach and free a node with its whole subtree
    pub fn remove(&mut self, id: NodeId) -> DomResult<()> {
        if id == self.root {
            return Err(DomError::HierarchyRequest);
        }
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    /// Replace `old` with `new_nodes` in place, freeing `old`.
    ///
    /// All insertions are validated before anything changes.
    pub fn replace_with_nodes(&mut self, old: NodeId, new_nodes: &[NodeId]) -> DomResult<()> {
        let parent = self.parent(old).ok_or(DomError::NotAChild)?;
        for &node in new_nodes {
            if node == old {
                return Err(DomError::HierarchyRequest);
            }
            self.check_insert(parent, node)?;
        }

        for &node in new_nodes {
            if let Some(prev_parent) = self.unlink(node) {
                self.record(prev_parent, Vec::new(), vec![node]);
            }
            self.link_before(parent, node, Some(old));
        }
        self.unlink(old);
        self.record(parent, new_nodes.to_vec(), vec![old]);
        self.free_subtree(old);
        Ok(())
    }

    /// Replace every child of `parent` with `new_nodes`, freeing the old children
    pub fn replace_children(&mut self, parent: NodeId, new_nodes: &[NodeId]) -> DomResult<()> {
        if !self.is_alive(parent) {
            return Err(DomError::NotFound);
        }
        for &node in new_nodes {
            if self.parent(node) == Some(parent) {
                return Err(DomError::HierarchyRequest);
            }
            self.check_insert(parent, node)?;
        }

        let old: Vec<NodeId> = self.children(parent).collect();
        for &child in &old {
            self.unlink(child);
        }
        for &node in new_nodes {
            if let Some(prev_parent) = self.unlink(node) {
                self.record(prev_parent, Vec::new(), vec![node]);
            }
            self.link_before(parent, node, None);
        }
        self.record(parent, new_nodes.to_vec(), old.clone());
        for child in old {
            self.free_subtree(child);
        }
        Ok(())
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> DomResult<()> {
        let p = self.get(parent).ok_or(DomError::NotFound)?;
        if !matches!(p.data, NodeData::Element(_) | NodeData::Document) {
            return Err(DomError::InvalidNodeType);
        }
        let c = self.get(child).ok_or(DomError::NotFound)?;
        if matches!(c.data, NodeData::Document) || self.contains(child, parent) {
            return Err(DomError::HierarchyRequest);
        }
        Ok(())
    }

    /// Unlink a node from its parent, returning the former parent
    fn unlink(&mut self, id: NodeId) -> Option<NodeId> {
        let (parent, prev, next) = {
            let node = self.get(id)?;
            (node.parent?, node.prev_sibling, node.next_sibling)
        };

        match prev {
            Some(p) => {
                if let Some(n) = self.get_mut(p) {
                    n.next_sibling = next;
                }
            }
            None => {
                if let Some(n) = self.get_mut(parent) {
                    n.first_child = next;
                }
            }
        }
        match next {
            Some(nx) => {
                if let Some(n) = self.get_mut(nx) {
                    n.prev_sibling = prev;
                }
            }
            None => {
                if let Some(n) = self.get_mut(parent) {
                    n.last_child = prev;
                }
            }
        }
        if let Some(node) = self.get_mut(id) {
            node.parent = None;
            node.prev_sibling = None;
            node.next_sibling = None;
        }
        Some(parent)
    }

    /// Link a detached node before `reference` (or last)
    fn link_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let prev = match reference {
            Some(r) => self.get(r).and_then(|n| n.prev_sibling),
            None => self.get(parent).and_then(|n| n.last_child),
        };

        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
            node.prev_sibling = prev;
            node.next_sibling = reference;
        }
        match prev {
            Some(p) => {
                if let Some(n) = self.get_mut(p) {
                    n.next_sibling = Some(child);
                }
            }
            None => {
                if let Some(n) = self.get_mut(parent) {
                    n.first_child = Some(child);
                }
            }
        }
        match reference {
            Some(r) => {
                if let Some(n) = self.get_mut(r) {
                    n.prev_sibling = Some(child);
                }
            }
            None => {
                if let Some(n) = self.get_mut(parent) {
                    n.last_child = Some(child);
                }
            }
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            let slot = &mut self.slots[node.index() as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_list.push(node.index());
            self.live -= 1;
        }
    }

    // ---------------------------------------------------------------------
    // Mutation observation
    // ---------------------------------------------------------------------

    /// Start recording child-list changes in the subtree of `root`
    pub fn observe(&mut self, root: NodeId) {
        tracing::debug!("Observing subtree of {:?}", root);
        self.observer.observe(root);
    }

    /// Stop recording and drop pending records
    pub fn disconnect(&mut self) {
        self.observer.disconnect();
    }

    pub fn observer(&self) -> &MutationObserver {
        &self.observer
    }

    /// Take the pending mutation records
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        self.observer.take_records()
    }

    fn record(&mut self, target: NodeId, added_nodes: Vec<NodeId>, removed_nodes: Vec<NodeId>) {
        let Some(root) = self.observer.root() else {
            return;
        };
        if self.contains(root, target) {
            self.observer.push_record(MutationRecord {
                target,
                added_nodes,
                removed_nodes,
            });
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DomTree, NodeId, NodeId, NodeId) {
        let mut tree = DomTree::new();
        let div = tree.create_element("div");
        let a = tree.create_text("a");
        let b = tree.create_text("b");
        tree.append_child(tree.root(), div).unwrap();
        tree.append_child(div, a).unwrap();
        tree.append_child(div, b).unwrap();
        (tree, div, a, b)
    }

    #[test]
    fn test_append_and_children() {
        let (tree, div, a, b) = sample();
        let children: Vec<_> = tree.children(div).collect();
        assert_eq!(children, vec![a, b]);
        assert_eq!(tree.parent(a), Some(div));
        assert_eq!(tree.text_content(div), "ab");
    }

    #[test]
    fn test_insert_before() {
        let (mut tree, div, a, b) = sample();
        let c = tree.create_text("c");
        tree.insert_before(div, c, Some(b)).unwrap();
        let children: Vec<_> = tree.children(div).collect();
        assert_eq!(children, vec![a, c, b]);
    }

    #[test]
    fn test_remove_frees_slot_and_bumps_generation() {
        let (mut tree, div, a, _) = sample();
        tree.remove(a).unwrap();
        assert!(!tree.is_alive(a));

        let reused = tree.create_text("new");
        assert_eq!(reused.index(), a.index());
        assert_ne!(reused, a);
        assert!(tree.get(a).is_none());
        assert_eq!(tree.children(div).count(), 1);
    }

    #[test]
    fn test_hierarchy_error() {
        let (mut tree, div, _, _) = sample();
        let inner = tree.create_element("span");
        tree.append_child(div, inner).unwrap();
        assert_eq!(tree.append_child(inner, div), Err(DomError::HierarchyRequest));
    }

    #[test]
    fn test_text_cannot_have_children() {
        let (mut tree, _, a, _) = sample();
        let c = tree.create_text("c");
        assert_eq!(tree.append_child(a, c), Err(DomError::InvalidNodeType));
    }

    #[test]
    fn test_replace_with_nodes_keeps_order() {
        let (mut tree, div, a, b) = sample();
        let x = tree.create_text("x");
        let img = tree.create_element("img");
        tree.replace_with_nodes(a, &[x, img]).unwrap();

        let children: Vec<_> = tree.children(div).collect();
        assert_eq!(children, vec![x, img, b]);
        assert!(!tree.is_alive(a));
    }

    #[test]
    fn test_replace_children() {
        let (mut tree, div, a, b) = sample();
        let x = tree.create_text("x");
        tree.replace_children(div, &[x]).unwrap();

        assert_eq!(tree.children(div).collect::<Vec<_>>(), vec![x]);
        assert!(!tree.is_alive(a));
        assert!(!tree.is_alive(b));
    }

    #[test]
    fn test_records_only_under_observed_root() {
        let (mut tree, div, _, _) = sample();
        let other = tree.create_element("aside");
        tree.append_child(tree.root(), other).unwrap();

        tree.observe(div);
        let t = tree.create_text("t");
        tree.append_child(div, t).unwrap();
        let u = tree.create_text("u");
        tree.append_child(other, u).unwrap();

        let records = tree.take_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].target, div);
        assert_eq!(records[0].added_nodes, vec![t]);

        tree.disconnect();
        let v = tree.create_text("v");
        tree.append_child(div, v).unwrap();
        assert!(tree.take_records().is_empty());
    }
}
