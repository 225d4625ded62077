//! Periodic job execution boundary.
//!
//! The tracker subsystem does not run its own timers; it schedules named
//! periodic jobs against a [`JobEngine`] and the engine fires them. The
//! engine contract is deliberately small: schedule, delete, pause all, shut
//! down, each of which may fail. [`TokioJobEngine`] is the in-process
//! implementation; tests substitute recording fakes.

mod tokio_engine;

pub use tokio_engine::TokioJobEngine;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the periodic-job engine.
#[derive(Debug, Error)]
pub enum SchedulingError {
    #[error("a job named '{0}' is already scheduled")]
    DuplicateJob(String),

    #[error("the scheduler has been shut down")]
    SchedulerShutDown,

    #[error("scheduling engine error: {0}")]
    Engine(String),
}

/// When a job first fires and how often it repeats.
#[derive(Debug, Clone)]
pub struct JobTrigger {
    pub interval: Duration,
    pub initial_delay: Duration,
}

impl JobTrigger {
    /// A trigger that first fires after one full interval.
    pub fn every(interval: Duration) -> Self {
        Self {
            interval,
            initial_delay: interval,
        }
    }

    /// Add a random delay of up to `max_jitter` before the first firing.
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        if !max_jitter.is_zero() {
            self.initial_delay += rand::rng().random_range(Duration::ZERO..=max_jitter);
        }
        self
    }
}

/// A unit of work the engine fires periodically.
///
/// Executions run on a blocking thread; implementations decide for
/// themselves whether a given firing should do any work (e.g. a tracker
/// whose shutdown flag is set returns immediately).
pub trait ScheduledJob: Send + Sync {
    /// The name the job is scheduled under. Must be unique per engine.
    fn name(&self) -> &str;

    /// Perform one execution. Errors are logged by the engine and do not
    /// affect subsequent firings.
    fn run(&self) -> anyhow::Result<()>;
}

/// Introspection snapshot of one scheduled job.
#[derive(Debug, Clone)]
pub struct JobInfo {
    pub name: String,
    pub interval: Duration,
    pub last_run_at: Option<DateTime<Utc>>,
}

/// The physical periodic-job primitive the tracker scheduler wraps.
///
/// Deleting a job that does not exist is not an error; `delete_job` reports
/// whether a binding was actually removed. `shutdown` stops the engine for
/// good: afterwards `schedule_job` fails with
/// [`SchedulingError::SchedulerShutDown`].
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait JobEngine: Send + Sync {
    /// Register a periodic job under its own name.
    async fn schedule_job(
        &self,
        trigger: JobTrigger,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<(), SchedulingError>;

    /// Remove a job binding, waiting out an in-flight execution.
    /// Returns whether a job with that name existed.
    async fn delete_job(&self, name: &str) -> Result<bool, SchedulingError>;

    /// Stop firing executions without deleting any job definitions.
    async fn pause_all(&self) -> Result<(), SchedulingError>;

    /// Tear the engine down, draining in-flight executions.
    async fn shutdown(&self) -> Result<(), SchedulingError>;

    /// Snapshot of the currently scheduled jobs.
    async fn jobs(&self) -> Vec<JobInfo>;
}
