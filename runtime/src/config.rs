//! Runtime configuration: capability targets and navigation timings.
//!
//! Loaded from `~/.caplift/config.json` when present (or the path named by
//! `CAPLIFT_CONFIG`). Every field is optional; missing fields fall back to
//! the built-in 4K targets.

use crate::capability::catalog;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "CAPLIFT_CONFIG";

/// The capability ceiling the patcher raises values to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityTargets {
    /// Bitrate/bandwidth ceiling, in the host's own units (kbps).
    pub max_bitrate: f64,
    pub max_height: f64,
    pub max_width: f64,
    /// Reported HDCP version string.
    pub hdcp_version: String,
    /// Versions advertised on output-info entries of manifest requests.
    pub supported_hdcp_versions: Vec<String>,
    /// Depth bound of a single patch traversal.
    pub max_depth: usize,
    /// Depth bound of the namespace walk performed at hook installation.
    pub namespace_depth: usize,
    /// Recurse into objects held inside arrays.
    pub descend_into_arrays: bool,
    /// Profile identifiers prepended to profile lists.
    pub profile_catalog: Vec<String>,
}

impl Default for CapabilityTargets {
    fn default() -> Self {
        Self {
            max_bitrate: 16000.0,
            max_height: 2160.0,
            max_width: 3840.0,
            hdcp_version: "2.2".to_string(),
            supported_hdcp_versions: ["2.2", "2.1", "2.0", "1.4"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            max_depth: 5,
            namespace_depth: 3,
            descend_into_arrays: false,
            profile_catalog: catalog::builtin_profiles().to_vec(),
        }
    }
}

impl CapabilityTargets {
    /// The target resolution as a `"{width}x{height}"` string.
    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.max_width, self.max_height)
    }
}

/// Timer settings for navigation tracking and installation retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationTimings {
    pub poll_interval_ms: u64,
    /// Delay between a history mutation and the location re-check.
    pub settle_ms: u64,
    /// Installation attempts scheduled after a session transition.
    pub reinstall_delays_ms: Vec<u64>,
    pub attempt_interval_ms: u64,
    /// Total window for the opportunistic installation loop.
    pub attempt_window_ms: u64,
    pub status_interval_ms: u64,
}

impl Default for NavigationTimings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            settle_ms: 50,
            reinstall_delays_ms: vec![100, 300, 500, 1000, 2000],
            attempt_interval_ms: 500,
            attempt_window_ms: 60_000,
            status_interval_ms: 2000,
        }
    }
}

impl NavigationTimings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn reinstall_delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.reinstall_delays_ms
            .iter()
            .map(|ms| Duration::from_millis(*ms))
    }

    pub fn attempt_interval(&self) -> Duration {
        Duration::from_millis(self.attempt_interval_ms)
    }

    pub fn attempt_window(&self) -> Duration {
        Duration::from_millis(self.attempt_window_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub targets: CapabilityTargets,
    pub timings: NavigationTimings,
}

impl RuntimeConfig {
    /// Load from `CAPLIFT_CONFIG`, then `~/.caplift/config.json`, else defaults.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_path(Path::new(&path));
        }
        let path = caplift_home().join("config.json");
        if path.exists() {
            Self::from_path(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load and validate a config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the runtime misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.targets;
        if t.max_bitrate <= 0.0 || t.max_height <= 0.0 || t.max_width <= 0.0 {
            return Err(ConfigError::Invalid(
                "bitrate, height and width targets must be positive".into(),
            ));
        }
        if t.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.timings.poll_interval_ms == 0 || self.timings.attempt_interval_ms == 0 {
            return Err(ConfigError::Invalid("timer intervals must be non-zero".into()));
        }
        if self.timings.status_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "status_interval_ms must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// `~/.caplift`, falling back to `/tmp/.caplift` without a home directory.
pub fn caplift_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".caplift")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.targets.max_bitrate, 16000.0);
        assert_eq!(config.targets.max_height, 2160.0);
        assert_eq!(config.targets.max_width, 3840.0);
        assert_eq!(config.targets.max_depth, 5);
        assert_eq!(config.targets.profile_catalog.len(), 14);
        assert_eq!(
            config.timings.reinstall_delays_ms,
            vec![100, 300, 500, 1000, 2000]
        );
        assert_eq!(config.targets.resolution_label(), "3840x2160");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"targets": {{"max_bitrate": 25000}}}}"#).unwrap();

        let config = RuntimeConfig::from_path(file.path()).unwrap();
        assert_eq!(config.targets.max_bitrate, 25000.0);
        assert_eq!(config.targets.max_height, 2160.0);
        assert_eq!(config.timings.poll_interval_ms, 200);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"targets": {{"max_depth": 0}}}}"#).unwrap();

        let err = RuntimeConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = RuntimeConfig::from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
