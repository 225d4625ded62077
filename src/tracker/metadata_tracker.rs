//! Per-core transaction/metadata tracker.
//!
//! Polls the repository for committed transactions after its checkpoint,
//! writes the touched nodes' metadata into the core's index and processes
//! deletes, then commits and advances the checkpoint.

use super::trait_def::{Tracker, TrackerKind, TrackerState};
use crate::index::IndexWriter;
use crate::repository::RepositoryClient;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MetadataTracker {
    id: String,
    core_name: String,
    state: TrackerState,
    repository: Arc<dyn RepositoryClient>,
    index: Arc<dyn IndexWriter>,
    last_txn_id: AtomicU64,
    batch_size: usize,
}

impl MetadataTracker {
    pub fn new(
        core_name: &str,
        repository: Arc<dyn RepositoryClient>,
        index: Arc<dyn IndexWriter>,
        batch_size: usize,
    ) -> Self {
        Self {
            id: format!("metadata-tracker@{core_name}"),
            core_name: core_name.to_string(),
            state: TrackerState::new(),
            repository,
            index,
            last_txn_id: AtomicU64::new(0),
            batch_size,
        }
    }

    /// The highest transaction id this tracker has indexed.
    pub fn checkpoint(&self) -> u64 {
        self.last_txn_id.load(Ordering::SeqCst)
    }
}

impl Tracker for MetadataTracker {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackerKind {
        TrackerKind::Metadata
    }

    fn set_shutdown(&self) {
        self.state.request_shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.state.is_shutdown()
    }

    fn track(&self) -> anyhow::Result<()> {
        let Some(_run) = self.state.try_begin_run() else {
            debug!("Metadata tracker for core {} is shut down, skipping run", self.core_name);
            return Ok(());
        };

        let mut indexed = 0usize;
        let mut deleted = 0usize;

        loop {
            // The flag may have been set mid-run by a teardown; stop between
            // batches rather than finishing the backlog.
            if self.state.is_shutdown() {
                warn!(
                    "Metadata tracker for core {} interrupted by shutdown at txn {}",
                    self.core_name,
                    self.checkpoint()
                );
                break;
            }

            let transactions = self
                .repository
                .fetch_transactions(self.checkpoint(), self.batch_size)?;
            if transactions.is_empty() {
                break;
            }

            for txn in &transactions {
                if !txn.updated.is_empty() {
                    self.index.index_nodes(&txn.updated)?;
                    indexed += txn.updated.len();
                }
                if !txn.deleted.is_empty() {
                    self.index.delete_nodes(&txn.deleted)?;
                    deleted += txn.deleted.len();
                }
                self.last_txn_id.store(txn.id, Ordering::SeqCst);
            }
        }

        if indexed > 0 || deleted > 0 {
            self.index.commit()?;
            info!(
                "Core {} metadata sync: {} node(s) indexed, {} deleted, checkpoint {}",
                self.core_name,
                indexed,
                deleted,
                self.checkpoint()
            );
        }
        Ok(())
    }

    fn close(&self) {
        if let Some(_quiesce) = self.state.begin_close() {
            if let Err(e) = self.index.close() {
                warn!(
                    "Failed to close index writer for core {} metadata tracker: {:#}",
                    self.core_name, e
                );
            }
            debug!("Metadata tracker for core {} closed", self.core_name);
        }
    }
}
