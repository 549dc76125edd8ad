//! Engine - scan, resolve and rewrite passes over a document

use std::sync::Arc;
use std::time::{Duration, Instant};

use emoji_dom::{Document, NodeId};
use emoji_net::Fetcher;
use futures::future::join_all;

use crate::config::{Config, Grammar};
use crate::error::ReplaceResult;
use crate::index::IndexCache;
use crate::processed::ProcessedNodeSet;
use crate::resolver::{Resolution, Resolver};
use crate::rewriter::{rewrite, RenderOptions, Rewriter};
use crate::scanner::{MarkerScanner, ScanRules};
use crate::sets::SetCache;
use crate::source::{EmojiEntry, ImageDefaults};
use crate::watcher::MutationWatcher;

/// Counts for one or more passes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Units that held at least one marker
    pub units: usize,
    pub markers: usize,
    /// Markers replaced by rendered content
    pub replaced: usize,
    /// Markers kept as literal text
    pub placeholders: usize,
}

impl ScanReport {
    pub fn merge(&mut self, other: ScanReport) {
        self.units += other.units;
        self.markers += other.markers;
        self.replaced += other.replaced;
        self.placeholders += other.placeholders;
    }
}

/// Emoji marker replacement engine
pub struct EmojiEngine {
    config: Config,
    index: IndexCache,
    sets: SetCache,
    resolver: Resolver,
    scanner: MarkerScanner,
    rewriter: Rewriter,
    processed: ProcessedNodeSet,
    watcher: MutationWatcher,
    ready: bool,
    started: Instant,
}

impl EmojiEngine {
    /// Create an engine; nothing is fetched until `init` or a resolution
    pub fn new(config: Config, fetcher: Arc<dyn Fetcher>) -> Self {
        let config = config.normalized();
        let defaults = ImageDefaults::from_config(&config);
        let index = IndexCache::new(config.index_url.clone(), fetcher.clone(), defaults.clone());
        let sets = SetCache::new(fetcher, index.clone(), defaults);
        let resolver = Resolver::new(sets.clone(), config.default_set.clone());
        let scanner = MarkerScanner::new(config.grammar, ScanRules::from_config(&config));
        let rewriter = Rewriter::new(RenderOptions::from_config(&config));
        let watcher = MutationWatcher::new(config.rescan, config.debounce_ms);

        Self {
            config,
            index,
            sets,
            resolver,
            scanner,
            rewriter,
            processed: ProcessedNodeSet::new(),
            watcher,
            ready: false,
            started: Instant::now(),
        }
    }

    /// Start observing the body (if configured) and load the index.
    ///
    /// On failure the engine stays disabled until `ensure_loaded` or
    /// `preload` succeeds. Additions seen meanwhile stay queued and are
    /// rescanned by the first `pump` after that.
    pub async fn init(&mut self, doc: &mut Document) -> ReplaceResult<()> {
        if self.config.observe_changes {
            if let Some(body) = doc.body() {
                doc.tree_mut().observe(body);
                self.watcher.watch(body);
            }
        }

        if self.index.has_source() {
            if let Err(err) = self.index.ensure_loaded().await {
                self.ready = false;
                tracing::error!("Emoji replacer disabled: {}", err);
                return Err(err);
            }
        } else {
            tracing::info!("No index URL configured, only inserted entries will resolve");
        }
        self.ready = true;
        tracing::info!("Emoji replacer ready ({:?} grammar)", self.config.grammar);
        Ok(())
    }

    /// Scan and replace everything under the body
    pub async fn replace_all(&mut self, doc: &mut Document) -> ScanReport {
        let Some(root) = doc.body().or_else(|| doc.document_element()) else {
            return ScanReport::default();
        };
        self.replace_in(doc, root).await
    }

    /// Scan and replace the subtree of `node`
    pub async fn replace_in(&mut self, doc: &mut Document, node: NodeId) -> ScanReport {
        if !self.ready {
            tracing::warn!("Emoji index not loaded yet, nothing replaced");
            return ScanReport::default();
        }
        self.run_pass(doc, &[node]).await
    }

    async fn run_pass(&mut self, doc: &mut Document, roots: &[NodeId]) -> ScanReport {
        self.processed.prune(doc.tree());
        let outcome = self.scanner.scan(doc.tree(), roots, &self.processed);
        let mut report = ScanReport {
            units: outcome.units.len(),
            markers: outcome.marker_count(),
            ..ScanReport::default()
        };
        self.processed.extend(outcome.scanned.iter().copied());
        if outcome.units.is_empty() {
            return report;
        }

        let markers: Vec<_> = outcome
            .units
            .iter()
            .flat_map(|u| u.markers.iter().cloned())
            .collect();
        let resolved = self.resolver.resolve_batch(&markers).await;

        for unit in &outcome.units {
            let found = unit
                .markers
                .iter()
                .filter(|m| resolved.get(&m.key()).is_some_and(Resolution::is_found))
                .count();

            let Some(replacements) = self.rewriter.plan(unit, &resolved) else {
                report.placeholders += unit.markers.len();
                continue;
            };
            let markup = rewrite(&unit.content, unit.kind, &replacements);
            match self.rewriter.commit(doc.tree_mut(), unit, &markup) {
                Ok(Some(created)) => {
                    self.processed.extend(created);
                    report.replaced += found;
                    report.placeholders += unit.markers.len() - found;
                }
                Ok(None) => report.placeholders += unit.markers.len(),
                Err(err) => {
                    tracing::error!("Failed to rewrite {:?}: {}", unit.node, err);
                    report.placeholders += unit.markers.len();
                }
            }
        }

        tracing::info!(
            "Replaced {} of {} markers in {} units",
            report.replaced,
            report.markers,
            report.units
        );
        report
    }

    /// Feed pending mutation records to the watcher and run the rescan pass
    /// if its quiet window has elapsed at `now_ms`.
    pub async fn pump(&mut self, doc: &mut Document, now_ms: u64) -> Option<ScanReport> {
        let records = doc.tree_mut().take_records();
        if !records.is_empty() {
            self.watcher
                .record(doc.tree(), &records, &self.processed, now_ms);
        }

        if !self.ready {
            if self.watcher.is_pending() {
                tracing::debug!("Emoji index not loaded yet, rescan deferred");
            }
            return None;
        }
        let batch = self.watcher.poll(doc.tree(), now_ms)?;
        tracing::debug!("Rescanning {} roots", batch.roots.len());
        Some(self.run_pass(doc, &batch.roots).await)
    }

    /// Run rescans on the wall clock until none is pending. Returns at once
    /// while the engine is disabled.
    pub async fn settle(&mut self, doc: &mut Document) -> ScanReport {
        let mut total = ScanReport::default();
        while self.ready {
            let now = self.now_ms();
            if let Some(report) = self.pump(doc, now).await {
                total.merge(report);
            }
            match self.watcher.next_deadline() {
                Some(deadline) => {
                    smol::Timer::after(Duration::from_millis(deadline.saturating_sub(now))).await;
                }
                None => break,
            }
        }
        total
    }

    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Drop one cached set or everything, and forget which nodes were
    /// processed so the next pass scans them again.
    pub fn invalidate(&mut self, set_id: Option<&str>) {
        self.sets.invalidate(set_id);
        if set_id.is_none() {
            self.index.clear();
        }
        self.processed.clear();
    }

    /// Load the index; enables a disabled engine on success
    pub async fn ensure_loaded(&mut self) -> ReplaceResult<()> {
        self.index.ensure_loaded().await?;
        self.ready = true;
        Ok(())
    }

    /// Load the index and the given sets concurrently. Every set is
    /// attempted; the first failure is returned.
    pub async fn preload(&mut self, set_ids: &[&str]) -> ReplaceResult<()> {
        self.ensure_loaded().await?;
        let results = join_all(set_ids.iter().map(|id| self.sets.resolve_set(id))).await;
        tracing::info!("Preloaded sets: {}", set_ids.join(", "));
        results.into_iter().try_for_each(|r| r.map(|_| ()))
    }

    /// Add or overwrite one entry by hand
    pub fn insert_entry(
        &self,
        set_id: &str,
        object_id: &str,
        data: &serde_json::Value,
    ) -> ReplaceResult<()> {
        self.sets.insert_entry(set_id, object_id, data)
    }

    /// Whether an entry is cached. `None` means the set flat markers use.
    pub fn has_entry(&self, set_id: Option<&str>, object_id: &str) -> bool {
        self.get_entry(set_id, object_id).is_some()
    }

    pub fn get_entry(&self, set_id: Option<&str>, object_id: &str) -> Option<EmojiEntry> {
        match set_id.or(self.config.default_set.as_deref()) {
            Some(set) => self.sets.entry(set, object_id),
            None => self.index.emoji(object_id),
        }
    }

    /// Object ids of a cached set, sorted
    pub fn list_entries(&self, set_id: Option<&str>) -> Vec<String> {
        match set_id.or(self.config.default_set.as_deref()) {
            Some(set) => self.sets.list(set).unwrap_or_default(),
            None => self.index.emoji_names(),
        }
    }

    /// Resolve one marker outside a pass
    pub async fn resolve(&self, object_id: &str, set_ref: Option<&str>) -> Resolution {
        let raw = match (self.config.grammar, set_ref) {
            (_, Some(set)) => format!("[{object_id}@{set}]"),
            (Grammar::Flat, None) => format!(":{object_id}:"),
            (Grammar::Scoped, None) => object_id.to_string(),
        };
        self.resolver.resolve(object_id, set_ref, &raw).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Stop observing, cancel any pending rescan and release processed
    /// tracking. Caches survive.
    pub fn teardown(&mut self, doc: &mut Document) {
        doc.tree_mut().disconnect();
        self.watcher.stop();
        self.processed.clear();
        tracing::info!("Emoji replacer torn down");
    }
}
