//! Dispatcher configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DispatchError;
use crate::types::{Priority, millis_u64};
use crate::worker::DEFAULT_PROCESSING_TIME;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Processing time for workers added without an explicit one.
    pub processing_ms: u64,
    /// Workers created up front.
    pub initial_workers: usize,
    /// Priority used for normal submissions.
    pub normal_priority: i64,
    /// Priority used for VIP submissions.
    pub vip_priority: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            processing_ms: millis_u64(DEFAULT_PROCESSING_TIME),
            initial_workers: 0,
            normal_priority: Priority::NORMAL.0,
            vip_priority: Priority::VIP.0,
        }
    }
}

impl DispatchConfig {
    /// Read and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, DispatchError> {
        let raw = std::fs::read_to_string(path)?;
        let config: DispatchConfig =
            toml::from_str(&raw).map_err(|e| DispatchError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "loaded dispatch config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.processing_ms == 0 {
            return Err(DispatchError::InvalidDuration(Duration::ZERO));
        }
        Ok(())
    }

    pub fn processing_time(&self) -> Duration {
        Duration::from_millis(self.processing_ms)
    }

    pub fn normal(&self) -> Priority {
        Priority(self.normal_priority)
    }

    pub fn vip(&self) -> Priority {
        Priority(self.vip_priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = std::env::temp_dir().join(format!("order-dispatch-{name}-{nanos}.toml"));
        std::fs::write(&path, contents).expect("write temp config");
        path
    }

    #[test]
    fn defaults_match_reference_tiers() {
        let config = DispatchConfig::default();
        assert_eq!(config.processing_time(), Duration::from_secs(10));
        assert_eq!(config.normal(), Priority::NORMAL);
        assert_eq!(config.vip(), Priority::VIP);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = temp_file("partial", "processing_ms = 250\ninitial_workers = 3\n");
        let config = DispatchConfig::from_file(&path).expect("valid config");
        std::fs::remove_file(&path).ok();
        assert_eq!(config.processing_ms, 250);
        assert_eq!(config.initial_workers, 3);
        assert_eq!(config.vip_priority, 50);
    }

    #[test]
    fn zero_processing_time_is_rejected() {
        let path = temp_file("zero", "processing_ms = 0\n");
        let result = DispatchConfig::from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(DispatchError::InvalidDuration(_))));
    }

    #[test]
    fn malformed_file_reports_path() {
        let path = temp_file("malformed", "processing_ms = \"soon\"\n");
        let result = DispatchConfig::from_file(&path);
        std::fs::remove_file(&path).ok();
        match result {
            Err(DispatchError::Config { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = DispatchConfig::from_file(Path::new("/nonexistent/order-dispatch.toml"));
        assert!(matches!(result, Err(DispatchError::Io(_))));
    }
}
