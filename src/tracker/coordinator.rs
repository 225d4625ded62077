//! Core teardown coordination.
//!
//! Closing a core is an ordered sequence: decide whether this is the last
//! registered core, flip shutdown flags, delete scheduled jobs, close
//! trackers, retire the shared model tracker and the scheduler if nothing
//! else needs them, and finally drop the registry entry. Scheduling and
//! close failures along the way are logged and skipped over: the registry
//! entry must always come out, otherwise the core would leak as registered
//! with no trackers and no jobs.

use super::registry::TrackerRegistry;
use super::scheduler::TrackerScheduler;
use super::trait_def::Tracker;
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct ShutdownCoordinator {
    registry: Arc<TrackerRegistry>,
    scheduler: Arc<TrackerScheduler>,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<TrackerRegistry>, scheduler: Arc<TrackerScheduler>) -> Self {
        Self {
            registry,
            scheduler,
        }
    }

    /// Tear down one core.
    ///
    /// Never returns an error: this runs on the host's core-close path,
    /// typically during process shutdown, where there is no caller left to
    /// handle one. Failures are observable in the logs only. Closing an
    /// unregistered core is a no-op.
    pub async fn close_core(&self, core_name: &str) {
        // Whole-sequence serialization: two concurrent teardowns must not
        // both conclude they are the last core, and a later teardown's
        // decision must see every earlier completed removal.
        let _gate = self.registry.lock_lifecycle().await;

        // Snapshot before any mutation; the answer must stay stable across
        // the scheduler I/O below.
        let core_names = self.registry.core_names();
        let is_last = core_names.len() == 1 && core_names.contains(core_name);
        let model_tracker = self.registry.model_tracker();
        let trackers = self.registry.trackers_for_core(core_name);

        if trackers.is_empty() && !self.registry.has_core(core_name) {
            debug!("Core {} is not registered, nothing to tear down", core_name);
            return;
        }

        info!(
            "Closing core {} ({} tracker(s), last registered: {})",
            core_name,
            trackers.len(),
            is_last
        );

        // Flags first, so an execution racing a still-queued trigger
        // observes shutdown and exits before job deletion lands.
        for tracker in &trackers {
            tracker.set_shutdown();
        }
        if is_last {
            if let Some(model) = &model_tracker {
                model.set_shutdown();
            }
        }

        if let Err(e) = self
            .scheduler
            .delete_tracker_jobs(core_name, &trackers)
            .await
        {
            error!("Failed to delete tracker jobs for core {}: {}", core_name, e);
        }
        for tracker in &trackers {
            close_tracker(Arc::clone(tracker)).await;
        }

        if is_last {
            if let Some(model) = model_tracker {
                let model: Arc<dyn Tracker> = model;
                if let Err(e) = self.scheduler.delete_tracker_job(core_name, &model).await {
                    error!("Failed to delete the model tracker job: {}", e);
                }
                close_tracker(model).await;
            }

            if !self.scheduler.is_shutdown() {
                if let Err(e) = self.scheduler.pause_all().await {
                    error!("Failed to pause scheduled jobs: {}", e);
                }
                if let Err(e) = self.scheduler.shutdown().await {
                    error!("Failed to shut down the tracker scheduler: {}", e);
                }
            }
        }

        self.registry.remove_core(core_name);
        if is_last {
            self.registry.clear_model_tracker();
        }
        info!("Core {} torn down", core_name);
    }

    /// Tear down every registered core, in name order.
    pub async fn close_all(&self) {
        loop {
            let mut names: Vec<String> = self.registry.core_names().into_iter().collect();
            if names.is_empty() {
                break;
            }
            names.sort();
            for name in names {
                self.close_core(&name).await;
            }
        }
    }
}

/// Tracker close may block on an in-flight run or an index flush, so it runs
/// on a blocking thread.
async fn close_tracker(tracker: Arc<dyn Tracker>) {
    let id = tracker.id().to_string();
    if let Err(e) = tokio::task::spawn_blocking(move || tracker.close()).await {
        error!("Close task for tracker {} failed: {}", id, e);
    }
}
