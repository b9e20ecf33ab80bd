//! Source Configuration
//!
//! Construction parameters of the filesystem change source. The engine
//! itself takes no configuration beyond the graph's capacity.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SourceError;

fn default_suffix() -> String {
    "csv".to_string()
}

fn default_quiet_window_ms() -> u64 {
    10_000
}

fn default_batch_buffer() -> usize {
    16
}

/// Settings for [`FsSource`](crate::source::FsSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory tree to scan and watch.
    pub root: PathBuf,

    /// File extension (without the dot) that marks a document.
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// How long the watcher waits after the last event before emitting a batch.
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    /// Batches buffered between the watcher and the engine.
    #[serde(default = "default_batch_buffer")]
    pub batch_buffer: usize,
}

impl SourceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            suffix: default_suffix(),
            quiet_window_ms: default_quiet_window_ms(),
            batch_buffer: default_batch_buffer(),
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_quiet_window(mut self, window: Duration) -> Self {
        self.quiet_window_ms = window.as_millis() as u64;
        self
    }

    pub fn with_batch_buffer(mut self, buffer: usize) -> Self {
        self.batch_buffer = buffer;
        self
    }

    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    /// Parse a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, SourceError> {
        let json = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let config = SourceConfig::from_json(r#"{"root": "/data/tables"}"#).unwrap();
        assert_eq!(config, SourceConfig::new("/data/tables"));
        assert_eq!(config.quiet_window(), Duration::from_secs(10));
        assert_eq!(config.suffix, "csv");
    }

    #[test]
    fn builder_overrides() {
        let config = SourceConfig::new("/tmp")
            .with_suffix(".json")
            .with_quiet_window(Duration::from_millis(250))
            .with_batch_buffer(2);
        assert_eq!(config.suffix, "json");
        assert_eq!(config.quiet_window_ms, 250);
        assert_eq!(config.batch_buffer, 2);
    }

    #[test]
    fn missing_root_is_an_error() {
        assert!(matches!(
            SourceConfig::from_json(r#"{"suffix": "csv"}"#),
            Err(SourceError::Config(_))
        ));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.json");
        std::fs::write(&path, r#"{"root": "tables", "quiet_window_ms": 50}"#).unwrap();

        let config = SourceConfig::load(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("tables"));
        assert_eq!(config.quiet_window_ms, 50);
    }
}
