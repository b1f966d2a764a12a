//! Save options and the structured save result.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::classify::ErrorCategory;
use super::format::OutputFormat;

/// What happens to the source EXIF block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExifMode {
    /// Carry the source EXIF over (optionally without GPS)
    #[default]
    Keep,
    /// Write no metadata at all
    Remove,
    /// Carry the source EXIF over and apply field edits
    Edit,
}

impl ExifMode {
    /// Parse a mode name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "keep" => Some(Self::Keep),
            "remove" => Some(Self::Remove),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExifMode::Keep => "keep",
            ExifMode::Remove => "remove",
            ExifMode::Edit => "edit",
        }
    }
}

impl std::fmt::Display for ExifMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-supplied EXIF field values for `ExifMode::Edit`.
///
/// Empty or whitespace-only values count as "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExifEditValues {
    pub artist: Option<String>,
    pub copyright_text: Option<String>,
    pub user_comment: Option<String>,
    pub datetime_original: Option<String>,
}

impl ExifEditValues {
    /// Trimmed copy with blank values turned into `None`.
    pub fn cleaned(&self) -> Self {
        fn clean(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        Self {
            artist: clean(&self.artist),
            copyright_text: clean(&self.copyright_text),
            user_comment: clean(&self.user_comment),
            datetime_original: clean(&self.datetime_original),
        }
    }

    /// True when no field carries a usable value.
    pub fn is_empty(&self) -> bool {
        let cleaned = self.cleaned();
        cleaned.artist.is_none()
            && cleaned.copyright_text.is_none()
            && cleaned.user_comment.is_none()
            && cleaned.datetime_original.is_none()
    }
}

/// Immutable options for one save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOptions {
    pub output_format: OutputFormat,
    pub quality: i32,
    pub dry_run: bool,
    pub exif_mode: ExifMode,
    pub remove_gps: bool,
    exif_edit: Option<ExifEditValues>,
    pub webp_method: i32,
    pub webp_lossless: bool,
    pub avif_speed: i32,
    /// Log the save decision at debug level
    pub verbose: bool,
}

impl SaveOptions {
    /// Options with the stock defaults for `format`.
    pub fn new(output_format: OutputFormat) -> Self {
        Self {
            output_format,
            quality: 85,
            dry_run: false,
            exif_mode: ExifMode::Keep,
            remove_gps: false,
            exif_edit: None,
            webp_method: 6,
            webp_lossless: false,
            avif_speed: 6,
            verbose: false,
        }
    }

    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_remove_gps(mut self, remove_gps: bool) -> Self {
        self.remove_gps = remove_gps;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_webp(mut self, method: i32, lossless: bool) -> Self {
        self.webp_method = method;
        self.webp_lossless = lossless;
        self
    }

    pub fn with_avif_speed(mut self, speed: i32) -> Self {
        self.avif_speed = speed;
        self
    }

    /// Set the EXIF mode. Leaving `Edit` drops any pending edit values.
    pub fn with_exif_mode(mut self, mode: ExifMode) -> Self {
        self.exif_mode = mode;
        if mode != ExifMode::Edit {
            self.exif_edit = None;
        }
        self
    }

    /// Switch to `ExifMode::Edit` with the given values.
    pub fn with_exif_edit(mut self, values: ExifEditValues) -> Self {
        self.exif_mode = ExifMode::Edit;
        self.exif_edit = Some(values);
        self
    }

    /// Edit values; only ever `Some` in `ExifMode::Edit`.
    pub fn exif_edit(&self) -> Option<&ExifEditValues> {
        self.exif_edit.as_ref()
    }

    /// Same options with a different output format.
    pub fn for_format(&self, output_format: OutputFormat) -> Self {
        Self {
            output_format,
            ..self.clone()
        }
    }
}

/// Outcome of one save attempt. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct SaveResult {
    pub success: bool,
    pub output_path: PathBuf,
    pub exif_mode: ExifMode,
    pub dry_run: bool,
    pub had_source_exif: bool,
    pub exif_requested: bool,
    pub exif_attached: bool,
    pub exif_fallback_without_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_skipped_reason: Option<String>,
    pub gps_removed: bool,
    pub edited_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_guidance: Option<String>,
    /// Set when the file name was adjusted to platform filename rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_notice: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaned_drops_blank_values() {
        let values = ExifEditValues {
            artist: Some("  Alice ".into()),
            copyright_text: Some("   ".into()),
            user_comment: Some(String::new()),
            datetime_original: None,
        };
        let cleaned = values.cleaned();
        assert_eq!(cleaned.artist.as_deref(), Some("Alice"));
        assert!(cleaned.copyright_text.is_none());
        assert!(cleaned.user_comment.is_none());
        assert!(!values.is_empty());
        assert!(ExifEditValues::default().is_empty());
    }

    #[test]
    fn test_edit_values_only_present_in_edit_mode() {
        let options = SaveOptions::new(OutputFormat::Jpeg).with_exif_edit(ExifEditValues {
            artist: Some("Alice".into()),
            ..Default::default()
        });
        assert_eq!(options.exif_mode, ExifMode::Edit);
        assert!(options.exif_edit().is_some());

        let options = options.with_exif_mode(ExifMode::Keep);
        assert!(options.exif_edit().is_none());
    }

    #[test]
    fn test_exif_mode_parse_and_serde() {
        assert_eq!(ExifMode::parse("EDIT"), Some(ExifMode::Edit));
        assert_eq!(ExifMode::parse("strip"), None);
        assert_eq!(serde_json::to_string(&ExifMode::Remove).unwrap(), "\"remove\"");
    }
}
