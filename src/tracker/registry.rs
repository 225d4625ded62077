//! Process-wide registry of cores and their trackers.
//!
//! The registry answers two kinds of questions: which trackers belong to a
//! core, and whether a core is the last one registered. The second one is
//! what model tracker retirement and scheduler shutdown hinge on, so the
//! registry also owns the lifecycle gate that serializes whole
//! registration/teardown sequences across threads.

use super::model_tracker::ModelTracker;
use super::trait_def::Tracker;
use crate::metrics;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("core '{0}' is already registered")]
    DuplicateCore(String),
}

#[derive(Default)]
struct RegistryInner {
    cores: HashMap<String, Vec<Arc<dyn Tracker>>>,
    model_tracker: Option<Arc<ModelTracker>>,
}

/// Mapping from core name to its trackers, plus the single shared model
/// tracker reference.
///
/// Invariant (maintained by `CoreAdmin` and `ShutdownCoordinator`, which
/// mutate only under the lifecycle gate): the model tracker is present iff
/// at least one core is registered.
pub struct TrackerRegistry {
    inner: Mutex<RegistryInner>,
    lifecycle_gate: tokio::sync::Mutex<()>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            lifecycle_gate: tokio::sync::Mutex::new(()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serialize a whole registration or teardown sequence.
    ///
    /// Holders may perform slow scheduler I/O under the guard; the data
    /// mutex is never held across an await point.
    pub async fn lock_lifecycle(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.lifecycle_gate.lock().await
    }

    /// All currently registered core names.
    pub fn core_names(&self) -> HashSet<String> {
        self.inner().cores.keys().cloned().collect()
    }

    pub fn core_count(&self) -> usize {
        self.inner().cores.len()
    }

    pub fn has_core(&self, core_name: &str) -> bool {
        self.inner().cores.contains_key(core_name)
    }

    /// The trackers owned by a core. Empty for unknown cores: teardown code
    /// must be able to query a core that is already partially torn down.
    pub fn trackers_for_core(&self, core_name: &str) -> Vec<Arc<dyn Tracker>> {
        self.inner()
            .cores
            .get(core_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn model_tracker(&self) -> Option<Arc<ModelTracker>> {
        self.inner().model_tracker.clone()
    }

    pub fn set_model_tracker(&self, tracker: Arc<ModelTracker>) {
        self.inner().model_tracker = Some(tracker);
    }

    /// Drop the model tracker reference. Retirement is caller-governed;
    /// `remove_core` never does this implicitly.
    pub fn clear_model_tracker(&self) -> Option<Arc<ModelTracker>> {
        self.inner().model_tracker.take()
    }

    pub fn register_core(
        &self,
        core_name: &str,
        trackers: Vec<Arc<dyn Tracker>>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner();
        if inner.cores.contains_key(core_name) {
            return Err(RegistryError::DuplicateCore(core_name.to_string()));
        }
        inner.cores.insert(core_name.to_string(), trackers);
        metrics::set_registered_cores(inner.cores.len());
        Ok(())
    }

    /// Remove a core's entry entirely, returning its trackers (empty for an
    /// unknown core). The model tracker is untouched.
    pub fn remove_core(&self, core_name: &str) -> Vec<Arc<dyn Tracker>> {
        let mut inner = self.inner();
        let removed = inner.cores.remove(core_name).unwrap_or_default();
        metrics::set_registered_cores(inner.cores.len());
        removed
    }
}

impl Default for TrackerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
