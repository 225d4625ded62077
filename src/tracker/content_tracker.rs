//! Per-core text content tracker.
//!
//! Complements the metadata tracker: where that one mirrors node metadata
//! and deletes, this one pulls the actual text content of changed nodes and
//! feeds it to the index, so full-text search stays current.

use super::trait_def::{Tracker, TrackerKind, TrackerState};
use crate::index::IndexWriter;
use crate::repository::RepositoryClient;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ContentTracker {
    id: String,
    core_name: String,
    state: TrackerState,
    repository: Arc<dyn RepositoryClient>,
    index: Arc<dyn IndexWriter>,
    last_change_id: AtomicU64,
    batch_size: usize,
}

impl ContentTracker {
    pub fn new(
        core_name: &str,
        repository: Arc<dyn RepositoryClient>,
        index: Arc<dyn IndexWriter>,
        batch_size: usize,
    ) -> Self {
        Self {
            id: format!("content-tracker@{core_name}"),
            core_name: core_name.to_string(),
            state: TrackerState::new(),
            repository,
            index,
            last_change_id: AtomicU64::new(0),
            batch_size,
        }
    }

    /// The highest content change id this tracker has applied.
    pub fn checkpoint(&self) -> u64 {
        self.last_change_id.load(Ordering::SeqCst)
    }
}

impl Tracker for ContentTracker {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackerKind {
        TrackerKind::Content
    }

    fn set_shutdown(&self) {
        self.state.request_shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.state.is_shutdown()
    }

    fn track(&self) -> anyhow::Result<()> {
        let Some(_run) = self.state.try_begin_run() else {
            debug!("Content tracker for core {} is shut down, skipping run", self.core_name);
            return Ok(());
        };

        let mut updated = 0usize;

        loop {
            if self.state.is_shutdown() {
                warn!(
                    "Content tracker for core {} interrupted by shutdown at change {}",
                    self.core_name,
                    self.checkpoint()
                );
                break;
            }

            let changes = self
                .repository
                .fetch_content_changes(self.checkpoint(), self.batch_size)?;
            if changes.is_empty() {
                break;
            }

            for change in &changes {
                self.index.update_content(change.node_id, &change.text)?;
                self.last_change_id.store(change.change_id, Ordering::SeqCst);
                updated += 1;
            }
        }

        if updated > 0 {
            self.index.commit()?;
            info!(
                "Core {} content sync: {} node(s) updated, checkpoint {}",
                self.core_name,
                updated,
                self.checkpoint()
            );
        }
        Ok(())
    }

    fn close(&self) {
        if let Some(_quiesce) = self.state.begin_close() {
            if let Err(e) = self.index.close() {
                warn!(
                    "Failed to close index writer for core {} content tracker: {:#}",
                    self.core_name, e
                );
            }
            debug!("Content tracker for core {} closed", self.core_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ContentChange, ModelDiff, RepoTransaction};
    use anyhow::Result;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct FixedRepository {
        changes: Vec<ContentChange>,
    }

    impl RepositoryClient for FixedRepository {
        fn fetch_model_diffs(&self, _known: &HashMap<String, u64>) -> Result<Vec<ModelDiff>> {
            Ok(Vec::new())
        }

        fn fetch_transactions(&self, _from: u64, _limit: usize) -> Result<Vec<RepoTransaction>> {
            Ok(Vec::new())
        }

        fn fetch_content_changes(&self, from: u64, limit: usize) -> Result<Vec<ContentChange>> {
            Ok(self
                .changes
                .iter()
                .filter(|c| c.change_id > from)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        contents: Mutex<Vec<(u64, String)>>,
        commits: AtomicUsize,
    }

    impl IndexWriter for RecordingIndex {
        fn index_nodes(&self, _nodes: &[crate::repository::NodeRecord]) -> Result<()> {
            Ok(())
        }

        fn delete_nodes(&self, _node_ids: &[u64]) -> Result<()> {
            Ok(())
        }

        fn update_content(&self, node_id: u64, text: &str) -> Result<()> {
            self.contents.lock().unwrap().push((node_id, text.to_string()));
            Ok(())
        }

        fn commit(&self) -> Result<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    fn change(change_id: u64, node_id: u64, text: &str) -> ContentChange {
        ContentChange {
            change_id,
            node_id,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_track_applies_content_changes_in_order() {
        let repository = Arc::new(FixedRepository {
            changes: vec![change(1, 100, "first"), change(2, 101, "second")],
        });
        let index = Arc::new(RecordingIndex::default());
        let tracker = ContentTracker::new(
            "orders",
            repository,
            Arc::clone(&index) as Arc<dyn IndexWriter>,
            100,
        );

        tracker.track().unwrap();

        assert_eq!(tracker.checkpoint(), 2);
        assert_eq!(
            *index.contents.lock().unwrap(),
            vec![(100, "first".to_string()), (101, "second".to_string())]
        );
        assert_eq!(index.commits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_track_pages_through_batches() {
        let repository = Arc::new(FixedRepository {
            changes: (1..=5).map(|i| change(i, 100 + i, "text")).collect(),
        });
        let index = Arc::new(RecordingIndex::default());
        let tracker = ContentTracker::new(
            "orders",
            repository,
            Arc::clone(&index) as Arc<dyn IndexWriter>,
            2, // force multiple fetches
        );

        tracker.track().unwrap();

        assert_eq!(tracker.checkpoint(), 5);
        assert_eq!(index.contents.lock().unwrap().len(), 5);
    }

    #[test]
    fn test_track_after_shutdown_does_no_work() {
        let repository = Arc::new(FixedRepository {
            changes: vec![change(1, 100, "first")],
        });
        let index = Arc::new(RecordingIndex::default());
        let tracker = ContentTracker::new(
            "orders",
            repository,
            Arc::clone(&index) as Arc<dyn IndexWriter>,
            100,
        );

        tracker.set_shutdown();
        tracker.track().unwrap();

        assert!(index.contents.lock().unwrap().is_empty());
        assert_eq!(tracker.checkpoint(), 0);
    }
}
