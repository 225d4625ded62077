//! Scheduler facade binding trackers to the periodic-job engine.
//!
//! Adds tracker-aware job naming on top of the raw [`JobEngine`] and owns
//! the subsystem's shutdown state: however many core teardowns race, the
//! underlying engine is shut down at most once.

use super::trait_def::Tracker;
use crate::scheduling::{JobEngine, JobTrigger, ScheduledJob, SchedulingError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Adapts a tracker to the engine's job contract. The shutdown-flag check
/// lives in `Tracker::track` itself, so a firing queued before job deletion
/// still comes out as a no-op.
struct TrackerJob {
    tracker: Arc<dyn Tracker>,
}

impl ScheduledJob for TrackerJob {
    fn name(&self) -> &str {
        self.tracker.id()
    }

    fn run(&self) -> anyhow::Result<()> {
        self.tracker.track()
    }
}

pub struct TrackerScheduler {
    engine: Arc<dyn JobEngine>,
    shut_down: AtomicBool,
}

impl TrackerScheduler {
    pub fn new(engine: Arc<dyn JobEngine>) -> Self {
        Self {
            engine,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Register a periodic job for one tracker. Engine refusals (duplicate
    /// job name, engine already shut down) are surfaced to the caller.
    pub async fn schedule_tracker(
        &self,
        core_name: &str,
        tracker: Arc<dyn Tracker>,
        trigger: JobTrigger,
    ) -> Result<(), SchedulingError> {
        if self.is_shutdown() {
            return Err(SchedulingError::SchedulerShutDown);
        }
        debug!(
            "Scheduling {} tracker {} for core {}",
            tracker.kind(),
            tracker.id(),
            core_name
        );
        self.engine
            .schedule_job(trigger, Arc::new(TrackerJob { tracker }))
            .await
    }

    /// Delete the jobs for a whole collection of trackers. Every deletion is
    /// attempted even when one fails; the first error is returned after the
    /// sweep. Absent jobs are not errors.
    pub async fn delete_tracker_jobs(
        &self,
        core_name: &str,
        trackers: &[Arc<dyn Tracker>],
    ) -> Result<(), SchedulingError> {
        let mut first_error = None;
        for tracker in trackers {
            match self.engine.delete_job(tracker.id()).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        "No scheduled job for tracker {} on core {}",
                        tracker.id(),
                        core_name
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to delete job for tracker {} on core {}: {}",
                        tracker.id(),
                        core_name,
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Single-job variant, used for the model tracker which is addressed
    /// independently of any core's bulk path.
    pub async fn delete_tracker_job(
        &self,
        core_name: &str,
        tracker: &Arc<dyn Tracker>,
    ) -> Result<(), SchedulingError> {
        if !self.engine.delete_job(tracker.id()).await? {
            debug!(
                "No scheduled job for tracker {} (deletion requested by core {})",
                tracker.id(),
                core_name
            );
        }
        Ok(())
    }

    pub fn is_shutdown(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stop firing any further executions without deleting job definitions.
    /// Used only as the final-shutdown precaution.
    pub async fn pause_all(&self) -> Result<(), SchedulingError> {
        self.engine.pause_all().await
    }

    /// Shut the engine down. The first caller wins; every later (or racing)
    /// caller gets an immediate `Ok` without touching the engine again.
    pub async fn shutdown(&self) -> Result<(), SchedulingError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            debug!("Tracker scheduler already shut down");
            return Ok(());
        }
        info!("Shutting down the tracker scheduler");
        self.engine.shutdown().await
    }
}
