//! Core registration.
//!
//! The counterpart of the shutdown coordinator: builds a core's trackers,
//! creates the shared model tracker lazily with the first core, and
//! schedules everything on the tracker scheduler. Registration takes the
//! same lifecycle gate as teardown, so a core cannot register while another
//! teardown is deciding whether it is the last one standing.

use super::content_tracker::ContentTracker;
use super::metadata_tracker::MetadataTracker;
use super::model_tracker::ModelTracker;
use super::registry::TrackerRegistry;
use super::scheduler::TrackerScheduler;
use super::trait_def::{Tracker, TrackerKind};
use crate::config::TrackerConfig;
use crate::index::IndexWriter;
use crate::repository::RepositoryClient;
use crate::scheduling::JobTrigger;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct CoreAdmin {
    registry: Arc<TrackerRegistry>,
    scheduler: Arc<TrackerScheduler>,
    repository: Arc<dyn RepositoryClient>,
    config: TrackerConfig,
}

impl CoreAdmin {
    pub fn new(
        registry: Arc<TrackerRegistry>,
        scheduler: Arc<TrackerScheduler>,
        repository: Arc<dyn RepositoryClient>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            registry,
            scheduler,
            repository,
            config,
        }
    }

    fn trigger_for(&self, kind: TrackerKind) -> JobTrigger {
        let interval = match kind {
            TrackerKind::Model => self.config.model_poll_interval,
            TrackerKind::Metadata => self.config.metadata_poll_interval,
            TrackerKind::Content => self.config.content_poll_interval,
        };
        JobTrigger::every(interval).with_jitter(self.config.startup_jitter)
    }

    /// Register a core: create its trackers, schedule their jobs, and record
    /// everything in the registry. The shared model tracker is created and
    /// scheduled together with the first core.
    ///
    /// On a scheduling failure the partial registration is unwound before
    /// the error is returned, so the registry invariants hold either way.
    pub async fn register_core(
        &self,
        core_name: &str,
        index: Arc<dyn IndexWriter>,
    ) -> Result<()> {
        let _gate = self.registry.lock_lifecycle().await;

        if self.scheduler.is_shutdown() {
            bail!(
                "cannot register core '{}': the tracker scheduler is shut down",
                core_name
            );
        }
        if self.registry.has_core(core_name) {
            bail!("core '{}' is already registered", core_name);
        }

        let created_model = if self.registry.model_tracker().is_none() {
            let model = Arc::new(ModelTracker::new(Arc::clone(&self.repository)));
            self.scheduler
                .schedule_tracker(
                    core_name,
                    Arc::clone(&model) as Arc<dyn Tracker>,
                    self.trigger_for(TrackerKind::Model),
                )
                .await
                .context("failed to schedule the model tracker")?;
            self.registry.set_model_tracker(model);
            true
        } else {
            false
        };

        let trackers: Vec<Arc<dyn Tracker>> = vec![
            Arc::new(MetadataTracker::new(
                core_name,
                Arc::clone(&self.repository),
                Arc::clone(&index),
                self.config.batch_size,
            )),
            Arc::new(ContentTracker::new(
                core_name,
                Arc::clone(&self.repository),
                Arc::clone(&index),
                self.config.batch_size,
            )),
        ];

        let mut scheduled: Vec<Arc<dyn Tracker>> = Vec::new();
        let mut failure = None;
        for tracker in &trackers {
            match self
                .scheduler
                .schedule_tracker(core_name, Arc::clone(tracker), self.trigger_for(tracker.kind()))
                .await
            {
                Ok(()) => scheduled.push(Arc::clone(tracker)),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(e) = failure {
            error!(
                "Failed to schedule trackers for core {}, unwinding registration: {}",
                core_name, e
            );
            self.unwind_registration(core_name, &trackers, &scheduled, created_model)
                .await;
            return Err(e).with_context(|| format!("failed to register core '{core_name}'"));
        }

        self.registry
            .register_core(core_name, trackers)
            .with_context(|| format!("failed to register core '{core_name}'"))?;
        info!("Registered core {} with 2 tracker(s)", core_name);
        Ok(())
    }

    /// Best-effort cleanup of a partially registered core. Runs under the
    /// lifecycle gate held by `register_core`.
    async fn unwind_registration(
        &self,
        core_name: &str,
        trackers: &[Arc<dyn Tracker>],
        scheduled: &[Arc<dyn Tracker>],
        created_model: bool,
    ) {
        for tracker in trackers {
            tracker.set_shutdown();
        }
        if let Err(e) = self.scheduler.delete_tracker_jobs(core_name, scheduled).await {
            warn!(
                "Failed to delete jobs while unwinding core {}: {}",
                core_name, e
            );
        }
        for tracker in trackers {
            let tracker = Arc::clone(tracker);
            if let Err(e) = tokio::task::spawn_blocking(move || tracker.close()).await {
                warn!("Close task failed while unwinding core {}: {}", core_name, e);
            }
        }

        // A model tracker created for this failed registration has no core
        // keeping it alive; retire it so the model-tracker-iff-cores
        // invariant survives the error path.
        if created_model {
            if let Some(model) = self.registry.clear_model_tracker() {
                let model: Arc<dyn Tracker> = model;
                model.set_shutdown();
                if let Err(e) = self.scheduler.delete_tracker_job(core_name, &model).await {
                    warn!("Failed to delete the model tracker job while unwinding: {}", e);
                }
                if let Err(e) = tokio::task::spawn_blocking(move || model.close()).await {
                    warn!("Model tracker close task failed while unwinding: {}", e);
                }
            }
        }
    }
}
