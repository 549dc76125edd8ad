//! Processed-node tracking
//!
//! Node ids are generational, so an id whose node was removed can never
//! match a node created later in the same slot. Dead ids are dropped by
//! `prune`; membership never keeps a node alive.

use std::collections::HashSet;

use emoji_dom::{DomTree, NodeId};

/// Set of nodes already scanned
#[derive(Debug, Clone, Default)]
pub struct ProcessedNodeSet {
    nodes: HashSet<NodeId>,
}

impl ProcessedNodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NodeId) -> bool {
        self.nodes.insert(node)
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.nodes.extend(nodes);
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Drop ids whose node no longer exists
    pub fn prune(&mut self, tree: &DomTree) -> usize {
        let before = self.nodes.len();
        self.nodes.retain(|&id| tree.is_alive(id));
        before - self.nodes.len()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_node_is_not_aliased() {
        let mut tree = DomTree::new();
        let root = tree.root();
        let old = tree.create_text("a");
        tree.append_child(root, old).unwrap();

        let mut processed = ProcessedNodeSet::new();
        processed.insert(old);
        tree.remove(old).unwrap();

        // Slot is recycled with a new generation
        let new = tree.create_text("b");
        assert_eq!(new.index(), old.index());
        assert!(!processed.contains(new));

        assert_eq!(processed.prune(&tree), 1);
        assert!(processed.is_empty());
    }
}
