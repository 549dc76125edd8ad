//! Mutation Observer
//!
//! Child-list observation over one subtree. The tree pushes records as it
//! mutates; consumers drain them with `take_records`.

use crate::NodeId;

/// Child-list mutation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
}

/// Mutation observer state
#[derive(Debug, Default)]
pub struct MutationObserver {
    root: Option<NodeId>,
    records: Vec<MutationRecord>,
}

impl MutationObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn disconnect(&mut self) {
        self.root = None;
        self.records.clear();
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn is_observing(&self) -> bool {
        self.root.is_some()
    }

    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn push_record(&mut self, record: MutationRecord) {
        self.records.push(record);
    }

    pub fn has_pending(&self) -> bool {
        !self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutation_observer() {
        let mut observer = MutationObserver::new();
        observer.observe(NodeId::new(1, 0));
        observer.push_record(MutationRecord {
            target: NodeId::new(1, 0),
            added_nodes: vec![NodeId::new(2, 0)],
            removed_nodes: Vec::new(),
        });

        assert!(observer.is_observing());
        assert!(observer.has_pending());

        observer.disconnect();
        assert!(!observer.is_observing());
        assert!(observer.take_records().is_empty());
    }
}
