//! The `karuku exif-plan` command: show what a save would do with a file's metadata.

use clap::Args;
use karuku_core::load::decode::format_to_string;
use karuku_core::metadata::{ExifSummary, MetadataExtractor};
use karuku_core::save::{
    preview_exif_plan, resolve_output_format, supported_output_formats, ExifMode, ExifPreview,
    OutputFormat,
};
use karuku_core::{Config, ImageDecoder};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::resize::{ExifArgs, FormatArg};

/// Arguments for the `exif-plan` command.
#[derive(Args, Debug)]
pub struct ExifPlanArgs {
    /// Image file to inspect
    pub file: PathBuf,

    #[command(flatten)]
    pub exif: ExifArgs,

    /// Output format the plan is for (default: save.format from the config)
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Also include a summary of the source metadata
    #[arg(long)]
    pub summary: bool,

    /// Print compact JSON instead of pretty JSON
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Serialize)]
struct ExifPlanReport<'a> {
    source: &'a Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    width: u32,
    height: u32,
    output_format: OutputFormat,
    plan: ExifPreview,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ExifSummary>,
}

/// Execute the exif-plan command.
pub async fn execute(args: ExifPlanArgs, config: Config) -> anyhow::Result<()> {
    let report = build_report(&args, &config)?;
    let json = karuku_core::output::to_json(&report, !args.compact)?;
    println!("{}", json);
    Ok(())
}

fn build_report<'a>(args: &'a ExifPlanArgs, config: &Config) -> anyhow::Result<ExifPlanReport<'a>> {
    if !args.file.exists() {
        anyhow::bail!(
            "Input path does not exist: {:?}\n\n  Hint: Check the file path and try again.",
            args.file
        );
    }

    let source = ImageDecoder::new(config.limits.clone()).decode_file(&args.file)?;
    let mode = args.exif.mode(config.save.exif_mode);
    let remove_gps = args.exif.remove_gps || config.save.remove_gps;
    let edits = args.exif.edit_values();
    let edits = (mode == ExifMode::Edit).then_some(&edits);

    let selection = match args.format {
        Some(format) => format.to_string(),
        None => config.save.format.clone(),
    };
    let output_format =
        resolve_output_format(&selection, source.traits(), &supported_output_formats());

    let plan = preview_exif_plan(source.exif.as_ref(), mode, remove_gps, edits, output_format);
    let metadata = if args.summary {
        source.exif.as_ref().and_then(MetadataExtractor::summarize)
    } else {
        None
    };
    let (width, height) = source.dimensions();

    Ok(ExifPlanReport {
        source: &args.file,
        format: source.format.map(format_to_string),
        width,
        height,
        output_format,
        plan,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};

    fn png_file(dir: &Path) -> PathBuf {
        let path = dir.join("plain.png");
        DynamicImage::new_rgb8(6, 4)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn plan_for_file_without_exif() {
        let dir = tempfile::tempdir().unwrap();
        let args = ExifPlanArgs {
            file: png_file(dir.path()),
            exif: ExifArgs::default(),
            format: None,
            summary: true,
            compact: true,
        };
        let report = build_report(&args, &Config::default()).unwrap();
        assert_eq!(report.format, Some("png"));
        assert_eq!((report.width, report.height), (6, 4));
        assert!(!report.plan.had_source_exif);
        assert!(report.metadata.is_none());
    }

    #[test]
    fn edit_values_switch_plan_to_edit() {
        let dir = tempfile::tempdir().unwrap();
        let args = ExifPlanArgs {
            file: png_file(dir.path()),
            exif: ExifArgs {
                artist: Some("Alice".into()),
                ..Default::default()
            },
            format: Some(FormatArg::Jpeg),
            summary: false,
            compact: false,
        };
        let report = build_report(&args, &Config::default()).unwrap();
        assert_eq!(report.plan.exif_mode, ExifMode::Edit);
        assert!(report.plan.exif_requested);
        assert!(report.plan.exif_will_be_attached);
        assert_eq!(report.plan.edited_fields, vec!["Artist".to_string()]);
    }

    #[test]
    fn avif_plan_never_attaches() {
        if !supported_output_formats().contains(&OutputFormat::Avif) {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let args = ExifPlanArgs {
            file: png_file(dir.path()),
            exif: ExifArgs {
                artist: Some("Alice".into()),
                ..Default::default()
            },
            format: Some(FormatArg::Avif),
            summary: false,
            compact: true,
        };
        let report = build_report(&args, &Config::default()).unwrap();
        assert_eq!(report.output_format, OutputFormat::Avif);
        assert!(report.plan.exif_requested);
        assert!(!report.plan.exif_will_be_attached);
        assert_eq!(
            report.plan.skipped_reason.as_deref(),
            Some("exif-unsupported-format")
        );
    }

    #[test]
    fn plan_uses_configured_format() {
        let dir = tempfile::tempdir().unwrap();
        let args = ExifPlanArgs {
            file: png_file(dir.path()),
            exif: ExifArgs::default(),
            format: None,
            summary: false,
            compact: true,
        };
        let mut config = Config::default();
        config.save.format = "png".into();
        let report = build_report(&args, &config).unwrap();
        assert_eq!(report.output_format, OutputFormat::Png);
    }

    #[test]
    fn missing_file_is_an_error() {
        let args = ExifPlanArgs {
            file: PathBuf::from("/no/such/file.jpg"),
            exif: ExifArgs::default(),
            format: None,
            summary: false,
            compact: false,
        };
        assert!(build_report(&args, &Config::default()).is_err());
    }
}
