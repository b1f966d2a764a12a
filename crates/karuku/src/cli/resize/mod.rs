//! The `karuku resize` command: load images, resize them and save them.

mod batch;
mod setup;
pub mod types;

pub use types::{ExifArgs, ExifModeArg, FormatArg, ReportFormatArg};

use clap::Args;
use karuku_core::session::prepare_items;
use karuku_core::{BatchSaveSession, CancellationToken, Config, LoadSession, ResizeSpec};
use std::path::PathBuf;

use batch::{drive_batch, drive_load, print_summary};
use setup::{collect_request, open_report, setup_resize};

/// Arguments for the `resize` command.
#[derive(Args, Debug)]
pub struct ResizeArgs {
    /// Image files and/or directories to load
    #[arg(required_unless_present = "paths_from")]
    pub inputs: Vec<PathBuf>,

    /// Read additional input paths (one per line, file:// URIs allowed) from a file, or "-" for stdin
    #[arg(long, value_name = "FILE")]
    pub paths_from: Option<PathBuf>,

    /// Output directory (defaults to the config file's save.output_dir)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Target size: original, w800, h600, long1024, 50% or 800x600
    #[arg(short, long, default_value = "original")]
    pub size: ResizeSpec,

    /// Output format
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Encoder quality, rounded to a multiple of 5 in 5..=100
    #[arg(short, long)]
    pub quality: Option<i32>,

    #[command(flatten)]
    pub exif: ExifArgs,

    /// WebP effort, 0 (fast) to 6 (slow)
    #[arg(long)]
    pub webp_method: Option<u8>,

    /// Encode WebP losslessly
    #[arg(long)]
    pub webp_lossless: bool,

    /// AVIF speed, 0 (slow) to 10 (fast)
    #[arg(long)]
    pub avif_speed: Option<u8>,

    /// Plan every save but write nothing
    #[arg(long)]
    pub dry_run: bool,

    /// Retry transient save failures (file in use, network path) with backoff
    #[arg(long)]
    pub retry: bool,

    /// After the run, re-run only the items that failed
    #[arg(long)]
    pub retry_failed: bool,

    /// Maximum number of files to load (0 = unlimited)
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Write a per-file report of the save results
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Report encoding (defaults to the report file's extension)
    #[arg(long, value_enum)]
    pub report_format: Option<ReportFormatArg>,
}

impl Default for ResizeArgs {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            paths_from: None,
            output_dir: None,
            size: ResizeSpec::Original,
            format: None,
            quality: None,
            exif: ExifArgs::default(),
            webp_method: None,
            webp_lossless: false,
            avif_speed: None,
            dry_run: false,
            retry: false,
            retry_failed: false,
            max_files: None,
            report: None,
            report_format: None,
        }
    }
}

/// Execute the resize command.
pub async fn execute(args: ResizeArgs, config: Config) -> anyhow::Result<()> {
    let ctx = setup_resize(&args, config)?;
    let request = collect_request(&args)?;

    let interrupt = CancellationToken::new();
    {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, finishing the current file...");
                interrupt.cancel();
            }
        });
    }

    // ── Load ──
    let session = LoadSession::start("Load", request, &ctx.config)?;
    let mut loaded = drive_load(session, &ctx.config, &interrupt).await?;
    if args.retry_failed && loaded.summary.can_retry() {
        if let Some(retry) = LoadSession::retry_failed(&loaded.summary, &ctx.config) {
            let retried = drive_load(retry?, &ctx.config, &interrupt).await?;
            loaded.merge_retry(retried);
        }
    }
    eprintln!("{}", loaded.summary);
    if loaded.reached_limit {
        tracing::warn!(
            "Stopped at the file limit ({}); raise it with --max-files",
            ctx.config.load.max_files
        );
    }
    if loaded.summary.canceled {
        return Ok(());
    }
    if loaded.jobs.is_empty() {
        tracing::warn!("No images were loaded");
        return Ok(());
    }

    // ── Save ──
    let mut jobs = loaded.jobs;
    let mut report = open_report(&args)?;
    let items = prepare_items(jobs.iter_mut());
    let session = BatchSaveSession::start("Batch save", items, ctx.plan.clone(), &ctx.config)?;
    let mut outcome = drive_batch(session, &mut jobs, &ctx.config, &interrupt, report.as_mut()).await?;

    if args.retry_failed && outcome.summary.can_retry() {
        let retry = BatchSaveSession::retry_failed(
            &outcome.summary,
            &mut jobs,
            ctx.plan.clone(),
            &ctx.config,
        );
        if let Some(retry) = retry {
            let retried = drive_batch(retry?, &mut jobs, &ctx.config, &interrupt, report.as_mut()).await?;
            outcome.merge_retry(retried);
        }
    }

    if let Some(report) = report {
        let count = report.len();
        report.finish()?;
        if let Some(path) = &args.report {
            tracing::info!("Wrote {} report records to {:?}", count, path);
        }
    }

    eprintln!("{}", outcome.message);
    print_summary(&outcome, &ctx.plan.output_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ResizeArgs,
    }

    #[test]
    fn resize_args_default_size_is_original() {
        let args = ResizeArgs::default();
        assert_eq!(args.size, ResizeSpec::Original);
    }

    #[test]
    fn resize_args_default_bool_flags_are_false() {
        let args = ResizeArgs::default();
        assert!(!args.dry_run);
        assert!(!args.retry);
        assert!(!args.retry_failed);
        assert!(!args.webp_lossless);
        assert!(!args.exif.remove_gps);
    }

    #[test]
    fn parses_full_command_line() {
        let harness = Harness::try_parse_from([
            "karuku", "a.jpg", "photos", "-o", "out", "-s", "w800", "-f", "jpg", "-q", "72",
            "--exif", "edit", "--artist", "Alice", "--report", "run.jsonl",
        ])
        .unwrap();
        let args = harness.args;
        assert_eq!(args.inputs, vec![PathBuf::from("a.jpg"), PathBuf::from("photos")]);
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));
        assert_eq!(args.size, ResizeSpec::Width { width: 800 });
        assert_eq!(args.format, Some(FormatArg::Jpeg));
        assert_eq!(args.quality, Some(72));
        assert_eq!(args.exif.exif_mode, Some(ExifModeArg::Edit));
        assert_eq!(args.exif.artist.as_deref(), Some("Alice"));
    }

    #[test]
    fn inputs_required_without_paths_from() {
        assert!(Harness::try_parse_from(["karuku"]).is_err());
        assert!(Harness::try_parse_from(["karuku", "--paths-from", "list.txt"]).is_ok());
    }

    #[test]
    fn rejects_bad_size() {
        assert!(Harness::try_parse_from(["karuku", "a.jpg", "--size", "huge"]).is_err());
    }
}
