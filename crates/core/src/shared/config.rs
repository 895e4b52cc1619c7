use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_DWELL_MS, DEFAULT_DWELL_PROGRESS_STEPS, DEFAULT_FIRST_FRAME_ATTEMPTS,
    DEFAULT_FLASH_MS, DEFAULT_JPEG_QUALITY, DEFAULT_ORIENTATION_THRESHOLD,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_SETTLE_MS,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunable timings and thresholds for a liveness session.
///
/// Missing fields in a config file fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    pub dwell_ms: u64,
    pub settle_ms: u64,
    pub flash_ms: u64,
    pub poll_interval_ms: u64,
    pub orientation_threshold: f64,
    pub jpeg_quality: u8,
    pub dwell_progress_steps: u32,
    pub first_frame_attempts: u32,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            dwell_ms: DEFAULT_DWELL_MS,
            settle_ms: DEFAULT_SETTLE_MS,
            flash_ms: DEFAULT_FLASH_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            orientation_threshold: DEFAULT_ORIENTATION_THRESHOLD,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            dwell_progress_steps: DEFAULT_DWELL_PROGRESS_STEPS,
            first_frame_attempts: DEFAULT_FIRST_FRAME_ATTEMPTS,
        }
    }
}

impl LivenessConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("PoseGuard").join("config.json"))
    }

    /// Loads the per-user config, silently falling back to defaults when it
    /// is missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring config: {e}");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dwell_ms == 0 {
            return Err(ConfigError::Invalid("dwell_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".into(),
            ));
        }
        if !(self.orientation_threshold > 0.0 && self.orientation_threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "orientation_threshold must be between 0 and 1, got {}",
                self.orientation_threshold
            )));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.dwell_progress_steps == 0 {
            return Err(ConfigError::Invalid(
                "dwell_progress_steps must be positive".into(),
            ));
        }
        if self.first_frame_attempts == 0 {
            return Err(ConfigError::Invalid(
                "first_frame_attempts must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn flash(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
