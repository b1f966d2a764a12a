//! CLI enum types for the resize command: output format, EXIF mode, report format.

use clap::{Args, ValueEnum};
use karuku_core::save::{ExifEditValues, ExifMode};
use karuku_core::ReportFormat;

/// Output image format selection.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum FormatArg {
    /// PNG for sources with alpha, JPEG otherwise
    Auto,
    #[value(alias = "jpg")]
    Jpeg,
    Png,
    Webp,
    Avif,
}

impl std::fmt::Display for FormatArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatArg::Auto => write!(f, "auto"),
            FormatArg::Jpeg => write!(f, "jpeg"),
            FormatArg::Png => write!(f, "png"),
            FormatArg::Webp => write!(f, "webp"),
            FormatArg::Avif => write!(f, "avif"),
        }
    }
}

/// What happens to the source EXIF block.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ExifModeArg {
    /// Carry the source metadata over
    Keep,
    /// Write no metadata
    Remove,
    /// Carry the source metadata over and apply the --artist/--copyright/... edits
    Edit,
}

impl From<ExifModeArg> for ExifMode {
    fn from(arg: ExifModeArg) -> Self {
        match arg {
            ExifModeArg::Keep => ExifMode::Keep,
            ExifModeArg::Remove => ExifMode::Remove,
            ExifModeArg::Edit => ExifMode::Edit,
        }
    }
}

/// Report file encodings.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum ReportFormatArg {
    /// One JSON array
    Json,
    /// One JSON object per line
    Jsonl,
}

impl From<ReportFormatArg> for ReportFormat {
    fn from(arg: ReportFormatArg) -> Self {
        match arg {
            ReportFormatArg::Json => ReportFormat::Json,
            ReportFormatArg::Jsonl => ReportFormat::JsonLines,
        }
    }
}

/// EXIF policy flags shared by `resize` and `exif-plan`.
#[derive(Args, Debug, Clone, Default)]
pub struct ExifArgs {
    /// EXIF handling (defaults to the config file's save.exif_mode)
    #[arg(long = "exif", value_enum)]
    pub exif_mode: Option<ExifModeArg>,

    /// Strip GPS data even when keeping EXIF
    #[arg(long)]
    pub remove_gps: bool,

    /// Artist to write in edit mode
    #[arg(long)]
    pub artist: Option<String>,

    /// Copyright to write in edit mode
    #[arg(long)]
    pub copyright: Option<String>,

    /// User comment to write in edit mode
    #[arg(long)]
    pub comment: Option<String>,

    /// DateTimeOriginal to write in edit mode ("YYYY:MM:DD HH:MM:SS")
    #[arg(long)]
    pub datetime_original: Option<String>,
}

impl ExifArgs {
    pub fn edit_values(&self) -> ExifEditValues {
        ExifEditValues {
            artist: self.artist.clone(),
            copyright_text: self.copyright.clone(),
            user_comment: self.comment.clone(),
            datetime_original: self.datetime_original.clone(),
        }
    }

    /// Resolve the effective mode. Edit values without an explicit mode
    /// imply `edit`.
    pub fn mode(&self, configured: ExifMode) -> ExifMode {
        match self.exif_mode {
            Some(mode) => mode.into(),
            None if !self.edit_values().is_empty() => ExifMode::Edit,
            None => configured,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edit_values_imply_edit_mode() {
        let args = ExifArgs {
            artist: Some("Alice".into()),
            ..Default::default()
        };
        assert_eq!(args.mode(ExifMode::Keep), ExifMode::Edit);
    }

    #[test]
    fn explicit_mode_wins() {
        let args = ExifArgs {
            exif_mode: Some(ExifModeArg::Remove),
            artist: Some("Alice".into()),
            ..Default::default()
        };
        assert_eq!(args.mode(ExifMode::Keep), ExifMode::Remove);
    }

    #[test]
    fn blank_edits_keep_configured_mode() {
        let args = ExifArgs {
            artist: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(args.mode(ExifMode::Remove), ExifMode::Remove);
    }

    #[test]
    fn format_display_matches_core_names() {
        for format in [FormatArg::Jpeg, FormatArg::Png, FormatArg::Webp, FormatArg::Avif] {
            assert!(karuku_core::OutputFormat::parse(&format.to_string()).is_some());
        }
        assert_eq!(FormatArg::Auto.to_string(), "auto");
    }
}
