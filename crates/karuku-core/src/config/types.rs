//! Sub-configuration structs with their defaults.

use crate::save::{ExifMode, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default save settings, used when the caller does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    /// "auto", "jpeg"/"jpg", "png", "webp" or "avif"
    pub format: String,

    /// Encoder quality (normalized to 5..=100 in steps of 5)
    pub quality: u8,

    /// WebP effort, 0 (fast) to 6 (slow)
    pub webp_method: u8,

    /// Encode WebP losslessly
    pub webp_lossless: bool,

    /// AVIF speed, 0 (slow) to 10 (fast)
    pub avif_speed: u8,

    /// What happens to the source EXIF block
    pub exif_mode: ExifMode,

    /// Strip GPS data even when keeping EXIF
    pub remove_gps: bool,

    /// Plan everything but write nothing
    pub dry_run: bool,

    /// Default output directory (empty = caller must supply one)
    pub output_dir: String,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            format: "auto".to_string(),
            quality: 85,
            webp_method: 6,
            webp_lossless: false,
            avif_speed: 6,
            exif_mode: ExifMode::Keep,
            remove_gps: false,
            dry_run: false,
            output_dir: String::new(),
        }
    }
}

/// Background load settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Maximum number of candidates per load session (0 = unlimited)
    pub max_files: usize,

    /// Extensions accepted for explicitly chosen/dropped files
    pub selectable_extensions: Vec<String>,

    /// Extensions picked up while walking directories
    pub recursive_extensions: Vec<String>,

    /// Capacity of the worker -> poller queue
    pub queue_capacity: usize,

    /// Poll timer period in milliseconds
    pub poll_interval_ms: u64,

    /// Max messages drained per poll tick
    pub poll_batch: usize,

    /// Emit a scan-progress message every N detected candidates
    pub scan_progress_every: usize,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            max_files: 600,
            selectable_extensions: ["png", "jpg", "jpeg", "webp", "avif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            recursive_extensions: ["jpg", "jpeg", "png"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            queue_capacity: 8,
            poll_interval_ms: 40,
            poll_batch: 30,
            scan_progress_every: 40,
        }
    }
}

impl LoadConfig {
    /// Poll timer period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 200,
            max_image_dimension: 20000,
        }
    }
}

/// Retry settings for failed saves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Whether failed saves may be retried at all
    pub allow_retry: bool,

    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before attempt n+1 is `base_delay_ms * n`
    pub base_delay_ms: u64,

    /// Upper bound for a single delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            allow_retry: false,
            max_attempts: 2,
            base_delay_ms: 350,
            max_delay_ms: 1500,
        }
    }
}

impl RetryConfig {
    /// Build the retry policy described by this section.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format ("pretty" or "json")
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
