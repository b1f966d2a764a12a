//! Uniform completion contract shared by load and batch sessions.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

use crate::save::{ExifMode, SaveResult};

/// Final outcome of one session, handed to the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OperationSummary {
    pub label: String,
    pub canceled: bool,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failed_details: Vec<String>,
    /// Paths a "retry failed only" run should cover. Empty when canceled.
    pub retry_paths: Vec<PathBuf>,
}

impl OperationSummary {
    /// Whether a "retry failed only" run can be offered.
    pub fn can_retry(&self) -> bool {
        !self.canceled && !self.retry_paths.is_empty()
    }

    /// Paths for the retry run, deduplicated in first-seen order.
    pub fn retry_targets(&self) -> Vec<PathBuf> {
        if self.canceled {
            return Vec::new();
        }
        crate::load::dedupe_paths(&self.retry_paths)
    }
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.canceled { "canceled" } else { "complete" };
        write!(
            f,
            "{} {}. Succeeded: {} / Failed: {} / Total: {}",
            self.label, state, self.succeeded, self.failed, self.total
        )
    }
}

/// One-line description of what happened to a save's metadata.
pub fn exif_status_text(result: &SaveResult) -> String {
    let exif = if result.exif_mode == ExifMode::Remove {
        "EXIF: removed".to_string()
    } else if result.exif_fallback_without_metadata {
        "EXIF: not attached (saved without metadata)".to_string()
    } else if result.exif_attached {
        "EXIF: attached".to_string()
    } else if let (true, Some(reason)) = (result.exif_requested, &result.exif_skipped_reason) {
        format!("EXIF: not attached ({})", reason)
    } else if result.had_source_exif {
        "EXIF: none".to_string()
    } else {
        "EXIF: no source metadata".to_string()
    };

    let mut text = exif;
    if result.gps_removed {
        text.push_str(" / GPS removed");
    }
    if !result.edited_fields.is_empty() {
        text.push_str(&format!(" / edited: {} fields", result.edited_fields.len()));
    }
    text
}
