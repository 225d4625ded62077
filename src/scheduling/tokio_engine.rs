//! Tokio implementation of the periodic-job engine.
//!
//! Each scheduled job gets its own task that sleeps for the trigger's
//! interval and runs the job on a blocking thread. Cancellation is
//! cooperative via per-job child tokens of one root token, so deleting a
//! single job and shutting the whole engine down share the same path.

use super::{JobEngine, JobInfo, JobTrigger, ScheduledJob, SchedulingError};
use crate::metrics;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

struct JobEntry {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    interval: Duration,
    last_run_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

/// In-process periodic-job engine backed by the tokio runtime.
pub struct TokioJobEngine {
    jobs: Mutex<HashMap<String, JobEntry>>,
    root_cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    shut_down: AtomicBool,
    drain_timeout: Duration,
}

impl TokioJobEngine {
    pub fn new(drain_timeout: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            root_cancel: CancellationToken::new(),
            paused: Arc::new(AtomicBool::new(false)),
            shut_down: AtomicBool::new(false),
            drain_timeout,
        }
    }

    fn jobs_locked(&self) -> std::sync::MutexGuard<'_, HashMap<String, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TokioJobEngine {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl JobEngine for TokioJobEngine {
    async fn schedule_job(
        &self,
        trigger: JobTrigger,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<(), SchedulingError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SchedulingError::SchedulerShutDown);
        }

        let name = job.name().to_string();
        let mut jobs = self.jobs_locked();
        if jobs.contains_key(&name) {
            return Err(SchedulingError::DuplicateJob(name));
        }

        debug!(
            "Scheduling job {} every {:?} (first run in {:?})",
            name, trigger.interval, trigger.initial_delay
        );

        let cancel = self.root_cancel.child_token();
        let last_run_at = Arc::new(Mutex::new(None));
        let handle = tokio::spawn(run_job_loop(
            name.clone(),
            trigger.clone(),
            job,
            cancel.clone(),
            Arc::clone(&self.paused),
            Arc::clone(&last_run_at),
        ));

        jobs.insert(
            name,
            JobEntry {
                cancel,
                handle,
                interval: trigger.interval,
                last_run_at,
            },
        );
        metrics::set_scheduled_jobs(jobs.len());
        Ok(())
    }

    async fn delete_job(&self, name: &str) -> Result<bool, SchedulingError> {
        let entry = {
            let mut jobs = self.jobs_locked();
            let entry = jobs.remove(name);
            metrics::set_scheduled_jobs(jobs.len());
            entry
        };

        match entry {
            Some(entry) => {
                entry.cancel.cancel();
                // Wait for the job task to wind down, including any in-flight
                // execution, so callers can safely release its resources next.
                if let Err(e) = entry.handle.await {
                    if e.is_panic() {
                        warn!("Job {} task panicked while stopping: {}", name, e);
                    }
                }
                debug!("Deleted job {}", name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn pause_all(&self) -> Result<(), SchedulingError> {
        self.paused.store(true, Ordering::SeqCst);
        debug!("Paused all job triggers");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), SchedulingError> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.root_cancel.cancel();
        let entries: Vec<(String, JobEntry)> = {
            let mut jobs = self.jobs_locked();
            metrics::set_scheduled_jobs(0);
            jobs.drain().collect()
        };

        let drain_timeout = self.drain_timeout;
        let waits = entries.into_iter().map(|(name, entry)| async move {
            if tokio::time::timeout(drain_timeout, entry.handle).await.is_err() {
                warn!("Job {} did not stop within {:?}", name, drain_timeout);
            }
        });
        futures::future::join_all(waits).await;

        debug!("Job engine shut down");
        Ok(())
    }

    async fn jobs(&self) -> Vec<JobInfo> {
        let jobs = self.jobs_locked();
        let mut infos: Vec<JobInfo> = jobs
            .iter()
            .map(|(name, entry)| JobInfo {
                name: name.clone(),
                interval: entry.interval,
                last_run_at: *entry
                    .last_run_at
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

async fn run_job_loop(
    name: String,
    trigger: JobTrigger,
    job: Arc<dyn ScheduledJob>,
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    last_run_at: Arc<Mutex<Option<DateTime<Utc>>>>,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(trigger.initial_delay) => {}
    }

    loop {
        if !paused.load(Ordering::SeqCst) {
            *last_run_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

            let job = Arc::clone(&job);
            let started = Instant::now();
            let result = tokio::task::spawn_blocking(move || job.run()).await;
            let elapsed = started.elapsed();

            match result {
                Ok(Ok(())) => {
                    debug!("Job {} completed in {:?}", name, elapsed);
                    metrics::record_job_run(&name, "success", elapsed);
                }
                Ok(Err(e)) => {
                    error!("Job {} failed after {:?}: {:#}", name, elapsed, e);
                    metrics::record_job_run(&name, "failed", elapsed);
                }
                Err(e) => {
                    error!("Job {} panicked after {:?}: {}", name, elapsed, e);
                    metrics::record_job_run(&name, "panic", elapsed);
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(trigger.interval) => {}
        }
    }
}
