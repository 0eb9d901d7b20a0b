//! Pipeline configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! max_image_dimension = 1568
//! async_threshold_bytes = 2097152
//!
//! [retry]
//! max_attempts = 3
//! base_delay_ms = 2000
//!
//! [estimate]
//! base_secs = 5.0
//! secs_per_mb = 4.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::imaging::MAX_DIMENSION;

/// Uploads larger than this run in the background by default.
pub const DEFAULT_ASYNC_THRESHOLD_BYTES: u64 = 2 * 1024 * 1024;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Retry policy for background extraction jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for every further attempt
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Linear processing-time estimate shown to the user on submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    /// Fixed cost of one extraction
    pub base_secs: f64,
    /// Additional cost per MiB of upload
    pub secs_per_mb: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            base_secs: 5.0,
            secs_per_mb: 4.0,
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Larger image side sent to the model, in pixels
    pub max_image_dimension: u32,
    /// Uploads strictly above this size default to background processing
    pub async_threshold_bytes: u64,
    pub retry: RetryConfig,
    pub estimate: EstimateConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: MAX_DIMENSION,
            async_threshold_bytes: DEFAULT_ASYNC_THRESHOLD_BYTES,
            retry: RetryConfig::default(),
            estimate: EstimateConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: PipelineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_image_dimension == 0 {
            return Err(ConfigError::Invalid(
                "max_image_dimension must be positive".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        let estimate = &self.estimate;
        if !(estimate.base_secs.is_finite() && estimate.base_secs >= 0.0)
            || !(estimate.secs_per_mb.is_finite() && estimate.secs_per_mb >= 0.0)
        {
            return Err(ConfigError::Invalid(
                "estimate values must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}
