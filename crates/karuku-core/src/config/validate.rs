//! Configuration validation with range checks.

use crate::error::ConfigError;
use crate::save::format::is_known_selection;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !is_known_selection(&self.save.format) {
            return Err(ConfigError::ValidationError(format!(
                "save.format must be auto, jpeg, jpg, png, webp or avif (got {:?})",
                self.save.format
            )));
        }
        if self.save.quality == 0 || self.save.quality > 100 {
            return Err(ConfigError::ValidationError(
                "save.quality must be between 1 and 100".into(),
            ));
        }
        if self.save.webp_method > 6 {
            return Err(ConfigError::ValidationError(
                "save.webp_method must be between 0 and 6".into(),
            ));
        }
        if self.save.avif_speed > 10 {
            return Err(ConfigError::ValidationError(
                "save.avif_speed must be between 0 and 10".into(),
            ));
        }
        if self.load.queue_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "load.queue_capacity must be > 0".into(),
            ));
        }
        if self.load.poll_batch == 0 {
            return Err(ConfigError::ValidationError(
                "load.poll_batch must be > 0".into(),
            ));
        }
        if self.load.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "load.poll_interval_ms must be > 0".into(),
            ));
        }
        if self.load.scan_progress_every == 0 {
            return Err(ConfigError::ValidationError(
                "load.scan_progress_every must be > 0".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        Ok(())
    }
}
