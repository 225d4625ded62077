//! Tracker lifecycle and scheduling for a repository-backed search index.
//!
//! A host search server carves its index into cores and registers each one
//! here; the subsystem keeps every core in sync with the content repository
//! through periodic background trackers and coordinates the ordered teardown
//! when cores close, including retiring the repository-wide model tracker
//! and the scheduler itself once the last core is gone.
//!
//! Typical wiring:
//!
//! ```no_run
//! use index_tracker::{
//!     CoreAdmin, NullIndexWriter, NullRepositoryClient, ShutdownCoordinator, TokioJobEngine,
//!     TrackerConfig, TrackerRegistry, TrackerScheduler,
//! };
//! use std::sync::Arc;
//!
//! # async fn wire() -> anyhow::Result<()> {
//! let config = TrackerConfig::default();
//! let engine = Arc::new(TokioJobEngine::new(config.drain_timeout));
//! let registry = Arc::new(TrackerRegistry::new());
//! let scheduler = Arc::new(TrackerScheduler::new(engine));
//! let admin = CoreAdmin::new(
//!     Arc::clone(&registry),
//!     Arc::clone(&scheduler),
//!     Arc::new(NullRepositoryClient),
//!     config,
//! );
//! let coordinator = ShutdownCoordinator::new(registry, scheduler);
//!
//! admin.register_core("orders", Arc::new(NullIndexWriter)).await?;
//! // ... core serves queries while trackers poll ...
//! coordinator.close_core("orders").await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod index;
pub mod metrics;
pub mod repository;
pub mod scheduling;
pub mod tracker;

// Re-export commonly used types for convenience
pub use config::{FileConfig, TrackerConfig};
pub use index::{IndexWriter, NullIndexWriter};
pub use repository::{NullRepositoryClient, RepositoryClient};
pub use scheduling::{JobEngine, JobInfo, JobTrigger, SchedulingError, TokioJobEngine};
pub use tracker::{
    ContentTracker, CoreAdmin, MetadataTracker, ModelTracker, ShutdownCoordinator, Tracker,
    TrackerKind, TrackerRegistry, TrackerScheduler,
};
