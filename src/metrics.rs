use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry};
use std::time::Duration;

/// Metric name prefix for all tracker subsystem metrics
const PREFIX: &str = "index_tracker";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Job execution metrics
    pub static ref JOB_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_job_runs_total"), "Total tracker job executions"),
        &["job", "status"]
    ).expect("Failed to create job_runs_total metric");

    pub static ref JOB_RUN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_job_run_duration_seconds"),
            "Tracker job execution duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
        &["job"]
    ).expect("Failed to create job_run_duration_seconds metric");

    // Lifecycle metrics
    pub static ref REGISTERED_CORES: Gauge = Gauge::new(
        format!("{PREFIX}_registered_cores"),
        "Number of cores currently registered with the tracker registry"
    ).expect("Failed to create registered_cores metric");

    pub static ref SCHEDULED_JOBS: Gauge = Gauge::new(
        format!("{PREFIX}_scheduled_jobs"),
        "Number of jobs currently scheduled on the job engine"
    ).expect("Failed to create scheduled_jobs metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(JOB_RUNS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(JOB_RUN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(REGISTERED_CORES.clone()));
    let _ = REGISTRY.register(Box::new(SCHEDULED_JOBS.clone()));

    tracing::debug!("Metrics system initialized");
}

/// Record one job execution outcome and its duration
pub fn record_job_run(job: &str, status: &str, elapsed: Duration) {
    JOB_RUNS_TOTAL.with_label_values(&[job, status]).inc();
    JOB_RUN_DURATION_SECONDS
        .with_label_values(&[job])
        .observe(elapsed.as_secs_f64());
}

/// Update the registered-core gauge
pub fn set_registered_cores(count: usize) {
    REGISTERED_CORES.set(count as f64);
}

/// Update the scheduled-job gauge
pub fn set_scheduled_jobs(count: usize) {
    SCHEDULED_JOBS.set(count as f64);
}
