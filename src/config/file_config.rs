use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Optional TOML overrides for [`TrackerConfig`](super::TrackerConfig).
///
/// Every field is optional; missing fields fall back to the built-in
/// defaults during `TrackerConfig::resolve`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Polling intervals
    pub model_poll_interval_secs: Option<u64>,
    pub metadata_poll_interval_secs: Option<u64>,
    pub content_poll_interval_secs: Option<u64>,

    // Batch and timing knobs
    pub batch_size: Option<usize>,
    pub startup_jitter_secs: Option<u64>,
    pub drain_timeout_secs: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
