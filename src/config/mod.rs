mod file_config;

pub use file_config::FileConfig;

use std::time::Duration;

/// Resolved tracker subsystem configuration.
///
/// Built from defaults optionally overridden by a TOML [`FileConfig`];
/// the host decides where that file comes from.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// How often the shared model tracker polls the repository.
    pub model_poll_interval: Duration,

    /// How often each core's metadata tracker polls for transactions.
    pub metadata_poll_interval: Duration,

    /// How often each core's content tracker polls for content changes.
    pub content_poll_interval: Duration,

    /// Maximum transactions/changes pulled per repository call.
    pub batch_size: usize,

    /// Upper bound for the random extra delay before a job's first run,
    /// spreading tracker start times after a mass core registration.
    pub startup_jitter: Duration,

    /// How long the job engine waits for in-flight executions on shutdown.
    pub drain_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            model_poll_interval: Duration::from_secs(120),
            metadata_poll_interval: Duration::from_secs(15),
            content_poll_interval: Duration::from_secs(30),
            batch_size: 500,
            startup_jitter: Duration::from_secs(5),
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl TrackerConfig {
    /// Resolve configuration from defaults and optional TOML file config.
    pub fn resolve(file_config: Option<FileConfig>) -> Self {
        let file = file_config.unwrap_or_default();
        let defaults = Self::default();

        Self {
            model_poll_interval: file
                .model_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.model_poll_interval),
            metadata_poll_interval: file
                .metadata_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.metadata_poll_interval),
            content_poll_interval: file
                .content_poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.content_poll_interval),
            batch_size: file.batch_size.unwrap_or(defaults.batch_size),
            startup_jitter: file
                .startup_jitter_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.startup_jitter),
            drain_timeout: file
                .drain_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.drain_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.model_poll_interval, Duration::from_secs(120));
        assert_eq!(config.metadata_poll_interval, Duration::from_secs(15));
        assert_eq!(config.content_poll_interval, Duration::from_secs(30));
        assert_eq!(config.batch_size, 500);
    }

    #[test]
    fn test_resolve_without_file_uses_defaults() {
        let config = TrackerConfig::resolve(None);
        assert_eq!(config.content_poll_interval, Duration::from_secs(30));
        assert_eq!(config.drain_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_file_overrides_defaults() {
        let file = FileConfig {
            content_poll_interval_secs: Some(5),
            batch_size: Some(50),
            ..Default::default()
        };

        let config = TrackerConfig::resolve(Some(file));

        assert_eq!(config.content_poll_interval, Duration::from_secs(5));
        assert_eq!(config.batch_size, 50);
        // Untouched fields keep their defaults
        assert_eq!(config.metadata_poll_interval, Duration::from_secs(15));
        assert_eq!(config.model_poll_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_load_file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "metadata_poll_interval_secs = 7\nstartup_jitter_secs = 0"
        )
        .unwrap();

        let loaded = FileConfig::load(file.path()).unwrap();
        assert_eq!(loaded.metadata_poll_interval_secs, Some(7));
        assert_eq!(loaded.startup_jitter_secs, Some(0));
        assert!(loaded.batch_size.is_none());

        let config = TrackerConfig::resolve(Some(loaded));
        assert_eq!(config.metadata_poll_interval, Duration::from_secs(7));
        assert_eq!(config.startup_jitter, Duration::ZERO);
    }

    #[test]
    fn test_load_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_size = [not toml").unwrap();

        let result = FileConfig::load(file.path());
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = FileConfig::load(std::path::Path::new("/nonexistent/tracker.toml"));
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to read config file"));
    }
}
