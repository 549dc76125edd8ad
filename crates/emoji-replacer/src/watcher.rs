//! Mutation Watcher
//!
//! Collects added nodes from mutation records and coalesces bursts with a
//! debounce deadline on a millisecond clock. Nodes created by the rewriter
//! are already processed and never schedule a rescan.

use std::collections::HashSet;

use emoji_dom::{DomTree, MutationRecord, NodeId};

use crate::config::RescanStrategy;
use crate::processed::ProcessedNodeSet;

/// Coalescing scheduler: a pending flag plus a deadline.
///
/// Every `notify` moves the deadline to `now + quiet`; `poll` fires once the
/// deadline has been reached and then clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Debouncer {
    quiet_ms: u64,
    deadline: Option<u64>,
}

impl Debouncer {
    pub fn new(quiet_ms: u64) -> Self {
        Self {
            quiet_ms,
            deadline: None,
        }
    }

    pub fn notify(&mut self, now_ms: u64) {
        self.deadline = Some(now_ms + self.quiet_ms);
    }

    /// Whether the trigger fires at `now_ms`
    pub fn poll(&mut self, now_ms: u64) -> bool {
        match self.deadline {
            Some(deadline) if now_ms >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<u64> {
        self.deadline
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn quiet_ms(&self) -> u64 {
        self.quiet_ms
    }
}

/// Roots to rescan in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescanBatch {
    pub roots: Vec<NodeId>,
}

/// Turns mutation records into debounced rescan batches
#[derive(Debug, Clone)]
pub struct MutationWatcher {
    root: Option<NodeId>,
    strategy: RescanStrategy,
    debouncer: Debouncer,
    added: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl MutationWatcher {
    pub fn new(strategy: RescanStrategy, quiet_ms: u64) -> Self {
        Self {
            root: None,
            strategy,
            debouncer: Debouncer::new(quiet_ms),
            added: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn watch(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    /// Stop watching and drop anything pending
    pub fn stop(&mut self) {
        self.root = None;
        self.cancel();
    }

    pub fn cancel(&mut self) {
        self.debouncer.cancel();
        self.added.clear();
        self.seen.clear();
    }

    pub fn is_watching(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Feed mutation records observed at `now_ms`. Returns how many new
    /// unprocessed nodes were queued.
    pub fn record(
        &mut self,
        tree: &DomTree,
        records: &[MutationRecord],
        processed: &ProcessedNodeSet,
        now_ms: u64,
    ) -> usize {
        if self.root.is_none() {
            return 0;
        }
        let mut queued = 0;
        for node in records.iter().flat_map(|r| r.added_nodes.iter().copied()) {
            if tree.is_alive(node) && !processed.contains(node) && self.seen.insert(node) {
                self.added.push(node);
                queued += 1;
            }
        }
        if queued > 0 {
            self.debouncer.notify(now_ms);
            tracing::debug!(
                "Queued {} added nodes, rescan due at {:?}",
                queued,
                self.debouncer.deadline()
            );
        }
        queued
    }

    /// The batch to rescan if the quiet window has elapsed
    pub fn poll(&mut self, tree: &DomTree, now_ms: u64) -> Option<RescanBatch> {
        if !self.debouncer.poll(now_ms) {
            return None;
        }
        let added: Vec<NodeId> = self.added.drain(..).filter(|&n| tree.is_alive(n)).collect();
        self.seen.clear();

        let roots = match self.strategy {
            RescanStrategy::WholeRoot => self.root.filter(|&r| tree.is_alive(r)).into_iter().collect(),
            RescanStrategy::AddedNodes => outermost(tree, &added),
        };
        (!roots.is_empty()).then_some(RescanBatch { roots })
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.debouncer.deadline()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }
}

/// Drop nodes that lie inside another node of the list
fn outermost(tree: &DomTree, nodes: &[NodeId]) -> Vec<NodeId> {
    nodes
        .iter()
        .copied()
        .filter(|&n| !nodes.iter().any(|&other| other != n && tree.contains(other, n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use emoji_dom::Document;

    #[test]
    fn test_debouncer_coalesces_burst() {
        let mut debouncer = Debouncer::new(100);
        debouncer.notify(0);
        debouncer.notify(50);
        debouncer.notify(120);

        assert!(!debouncer.poll(200));
        assert!(debouncer.poll(220));
        assert!(!debouncer.poll(400));
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn test_debouncer_cancel() {
        let mut debouncer = Debouncer::new(100);
        debouncer.notify(0);
        debouncer.cancel();
        assert!(!debouncer.poll(1000));
    }

    fn watched_doc() -> (Document, MutationWatcher) {
        let mut doc = Document::default();
        let body = doc.body().unwrap();
        doc.tree_mut().observe(body);
        let mut watcher = MutationWatcher::new(RescanStrategy::AddedNodes, 100);
        watcher.watch(body);
        (doc, watcher)
    }

    #[test]
    fn test_added_nodes_batch() {
        let (mut doc, mut watcher) = watched_doc();
        let body = doc.body().unwrap();
        let div = doc.tree_mut().create_element("div");
        let span = doc.tree_mut().create_element("span");
        doc.tree_mut().append_child(body, div).unwrap();
        doc.tree_mut().append_child(div, span).unwrap();

        let records = doc.tree_mut().take_records();
        let processed = ProcessedNodeSet::new();
        assert_eq!(watcher.record(doc.tree(), &records, &processed, 0), 2);

        assert_eq!(watcher.poll(doc.tree(), 99), None);
        let batch = watcher.poll(doc.tree(), 100).unwrap();
        // span lies inside div
        assert_eq!(batch.roots, vec![div]);
        assert_eq!(watcher.poll(doc.tree(), 500), None);
    }

    #[test]
    fn test_processed_additions_do_not_schedule() {
        let (mut doc, mut watcher) = watched_doc();
        let body = doc.body().unwrap();
        let img = doc.tree_mut().create_element("img");
        doc.tree_mut().append_child(body, img).unwrap();

        let mut processed = ProcessedNodeSet::new();
        processed.insert(img);
        let records = doc.tree_mut().take_records();
        assert_eq!(watcher.record(doc.tree(), &records, &processed, 0), 0);
        assert!(!watcher.is_pending());
    }

    #[test]
    fn test_removed_before_due_is_dropped() {
        let (mut doc, mut watcher) = watched_doc();
        let body = doc.body().unwrap();
        let div = doc.tree_mut().create_element("div");
        doc.tree_mut().append_child(body, div).unwrap();
        let records = doc.tree_mut().take_records();
        watcher.record(doc.tree(), &records, &ProcessedNodeSet::new(), 0);

        doc.tree_mut().remove(div).unwrap();
        assert_eq!(watcher.poll(doc.tree(), 100), None);
    }

    #[test]
    fn test_whole_root_strategy() {
        let mut doc = Document::default();
        let body = doc.body().unwrap();
        doc.tree_mut().observe(body);
        let mut watcher = MutationWatcher::new(RescanStrategy::WholeRoot, 300);
        watcher.watch(body);

        let p = doc.tree_mut().create_element("p");
        doc.tree_mut().append_child(body, p).unwrap();
        let records = doc.tree_mut().take_records();
        watcher.record(doc.tree(), &records, &ProcessedNodeSet::new(), 10);

        assert_eq!(watcher.next_deadline(), Some(310));
        let batch = watcher.poll(doc.tree(), 310).unwrap();
        assert_eq!(batch.roots, vec![body]);
    }

    #[test]
    fn test_stopped_watcher_ignores_records() {
        let (mut doc, mut watcher) = watched_doc();
        watcher.stop();
        let body = doc.body().unwrap();
        let div = doc.tree_mut().create_element("div");
        doc.tree_mut().append_child(body, div).unwrap();
        let records = doc.tree_mut().take_records();
        assert_eq!(watcher.record(doc.tree(), &records, &ProcessedNodeSet::new(), 0), 0);
    }
}
