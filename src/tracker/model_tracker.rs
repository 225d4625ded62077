//! Repository-wide content model tracker.
//!
//! One instance exists per process, shared by every registered core. It
//! keeps a cache of model checksums and pulls model diffs from the
//! repository so cores index against up-to-date models. The registry owns
//! it; it is created with the first core and retired with the last.

use super::trait_def::{Tracker, TrackerKind, TrackerState};
use crate::repository::RepositoryClient;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

pub struct ModelTracker {
    id: String,
    state: TrackerState,
    repository: Arc<dyn RepositoryClient>,
    known_models: Mutex<HashMap<String, u64>>,
}

impl ModelTracker {
    pub fn new(repository: Arc<dyn RepositoryClient>) -> Self {
        Self {
            id: "model-tracker".to_string(),
            state: TrackerState::new(),
            repository,
            known_models: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of the model checksums pulled so far.
    pub fn known_models(&self) -> HashMap<String, u64> {
        self.known_models
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Tracker for ModelTracker {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> TrackerKind {
        TrackerKind::Model
    }

    fn set_shutdown(&self) {
        self.state.request_shutdown();
    }

    fn is_shutdown(&self) -> bool {
        self.state.is_shutdown()
    }

    fn track(&self) -> anyhow::Result<()> {
        let Some(_run) = self.state.try_begin_run() else {
            debug!("Model tracker is shut down, skipping run");
            return Ok(());
        };

        let known = self.known_models();
        let diffs = self.repository.fetch_model_diffs(&known)?;
        if diffs.is_empty() {
            return Ok(());
        }

        let mut models = self
            .known_models
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for diff in &diffs {
            models.insert(diff.name.clone(), diff.checksum);
        }
        info!("Pulled {} model change(s) from the repository", diffs.len());
        Ok(())
    }

    fn close(&self) {
        if let Some(_quiesce) = self.state.begin_close() {
            self.known_models
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            debug!("Model tracker closed");
        }
    }
}
