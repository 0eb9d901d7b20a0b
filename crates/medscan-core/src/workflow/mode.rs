//! Sync/async execution choice and processing-time estimate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EstimateConfig;

/// Where an extraction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// In the caller's request, result returned immediately
    Sync,
    /// On the background runner
    Async,
}

/// Caller preference that overrides the size-based choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeOverride {
    #[default]
    Default,
    ForceSync,
    ForceAsync,
}

/// Uploads strictly larger than `threshold` go to the background runner.
pub fn decide_mode(byte_size: u64, threshold: u64, mode_override: ModeOverride) -> ExecutionMode {
    match mode_override {
        ModeOverride::ForceSync => ExecutionMode::Sync,
        ModeOverride::ForceAsync => ExecutionMode::Async,
        ModeOverride::Default if byte_size > threshold => ExecutionMode::Async,
        ModeOverride::Default => ExecutionMode::Sync,
    }
}

/// Linear estimate of the processing time for an upload.
///
/// Non-decreasing in `byte_size`.
pub fn estimated_duration(byte_size: u64, estimate: &EstimateConfig) -> Duration {
    let megabytes = byte_size as f64 / (1024.0 * 1024.0);
    let secs = estimate.base_secs + estimate.secs_per_mb.max(0.0) * megabytes;
    let secs = if secs.is_finite() { secs.max(0.0) } else { 0.0 };
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    #[test]
    fn test_size_threshold() {
        assert_eq!(decide_mode(3 * MB, 2 * MB, ModeOverride::Default), ExecutionMode::Async);
        assert_eq!(decide_mode(500 * 1024, 2 * MB, ModeOverride::Default), ExecutionMode::Sync);
        assert_eq!(decide_mode(2 * MB, 2 * MB, ModeOverride::Default), ExecutionMode::Sync);
        assert_eq!(decide_mode(2 * MB + 1, 2 * MB, ModeOverride::Default), ExecutionMode::Async);
    }

    #[test]
    fn test_overrides_win() {
        assert_eq!(decide_mode(3 * MB, 2 * MB, ModeOverride::ForceSync), ExecutionMode::Sync);
        assert_eq!(decide_mode(10, 2 * MB, ModeOverride::ForceAsync), ExecutionMode::Async);
    }

    #[test]
    fn test_estimate_grows_with_size() {
        let config = EstimateConfig::default();
        let small = estimated_duration(100 * 1024, &config);
        let large = estimated_duration(8 * MB, &config);
        assert!(small >= Duration::from_secs_f64(config.base_secs));
        assert!(large > small);
        assert_eq!(estimated_duration(0, &config), Duration::from_secs(5));
    }

    #[test]
    fn test_estimate_never_panics_on_bad_config() {
        let config = EstimateConfig {
            base_secs: f64::NAN,
            secs_per_mb: -3.0,
        };
        assert_eq!(estimated_duration(MB, &config), Duration::ZERO);
    }
}
