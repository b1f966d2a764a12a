//! Resize setup: config overrides, output directory checks, input collection.

use karuku_core::load::parse_path_list;
use karuku_core::output::ReportFormat;
use karuku_core::save::format::is_known_selection;
use karuku_core::save::naming::{is_windows_path_length_risky, preflight_output_directory};
use karuku_core::save::{supported_output_formats, ExifMode, OutputFormat, SaveOptions};
use karuku_core::session::BatchPlan;
use karuku_core::{Config, LoadRequest, ReportWriter, SaveRecord};
use std::fs::File;
use std::io::{BufWriter, Read};
use std::path::{Path, PathBuf};

use super::ResizeArgs;

/// Report sink for one resize run.
pub type ReportSink = ReportWriter<BufWriter<File>, SaveRecord>;

/// Everything the load and save phases need.
pub(crate) struct ResizeContext {
    pub config: Config,
    pub plan: BatchPlan,
}

/// Apply CLI overrides to `config`, check the output directory and build the batch plan.
pub fn setup_resize(args: &ResizeArgs, mut config: Config) -> anyhow::Result<ResizeContext> {
    if let Some(max_files) = args.max_files {
        config.load.max_files = max_files;
    }
    if let Some(format) = args.format {
        config.save.format = format.to_string();
    }
    if let Some(quality) = args.quality {
        config.save.quality = quality.clamp(1, 100) as u8;
    }
    if let Some(method) = args.webp_method {
        config.save.webp_method = method;
    }
    if args.webp_lossless {
        config.save.webp_lossless = true;
    }
    if let Some(speed) = args.avif_speed {
        config.save.avif_speed = speed;
    }
    if args.dry_run {
        config.save.dry_run = true;
    }
    if args.exif.remove_gps {
        config.save.remove_gps = true;
    }
    config.save.exif_mode = args.exif.mode(config.save.exif_mode);
    if args.retry {
        config.retry.allow_retry = true;
    }

    let selection = config.save.format.trim().to_lowercase();
    if !is_known_selection(&selection) {
        anyhow::bail!(
            "Unknown output format {:?}\n\n  Hint: Use auto, jpeg, png, webp or avif.",
            config.save.format
        );
    }
    if let Some(format) = OutputFormat::parse(&selection) {
        if !supported_output_formats().contains(&format) {
            tracing::warn!(
                "{} encoding is not available in this build; saving as JPEG instead",
                format
            );
        }
    }

    let output_dir = resolve_output_dir(args, &config)?;
    if config.save.dry_run {
        if !output_dir.is_dir() {
            tracing::warn!("Dry run: output directory {:?} does not exist", output_dir);
        }
    } else {
        preflight_output_directory(&output_dir, true)?;
    }
    if is_windows_path_length_risky(&output_dir) {
        tracing::warn!(
            "Output directory path is very long; some files may fail to save: {:?}",
            output_dir
        );
    }

    let save = &config.save;
    let mut options = SaveOptions::new(OutputFormat::parse(&selection).unwrap_or(OutputFormat::Jpeg))
        .with_quality(i32::from(save.quality))
        .with_dry_run(save.dry_run)
        .with_remove_gps(save.remove_gps)
        .with_webp(i32::from(save.webp_method), save.webp_lossless)
        .with_avif_speed(i32::from(save.avif_speed))
        .with_exif_mode(save.exif_mode);
    let edits = args.exif.edit_values();
    if save.exif_mode == ExifMode::Edit && !edits.is_empty() {
        options = options.with_exif_edit(edits);
    }
    options = options.with_verbose(tracing::enabled!(tracing::Level::DEBUG));

    let plan = BatchPlan {
        output_dir,
        resize: args.size,
        format_selection: selection,
        options,
        allow_retry: config.retry.allow_retry,
        retry: config.retry.policy(),
    };
    tracing::debug!("Batch plan: {:?}", plan);

    Ok(ResizeContext { config, plan })
}

fn resolve_output_dir(args: &ResizeArgs, config: &Config) -> anyhow::Result<PathBuf> {
    match &args.output_dir {
        Some(dir) => Ok(PathBuf::from(
            shellexpand::tilde(&dir.to_string_lossy()).into_owned(),
        )),
        None => config.output_dir().ok_or_else(|| {
            anyhow::anyhow!(
                "No output directory given\n\n  Hint: Pass -o DIR or set save.output_dir in the config file."
            )
        }),
    }
}

/// Build the load request from positional inputs plus `--paths-from`.
pub fn collect_request(args: &ResizeArgs) -> anyhow::Result<LoadRequest> {
    let mut inputs = args.inputs.clone();

    if let Some(list) = &args.paths_from {
        let raw = if list == Path::new("-") {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        } else {
            std::fs::read_to_string(list).map_err(|e| {
                anyhow::anyhow!("Cannot read path list {:?}: {}", list, e)
            })?
        };
        inputs.extend(parse_path_list(&raw));
    }

    let missing: Vec<&PathBuf> = inputs.iter().filter(|p| !p.exists()).collect();
    for path in &missing {
        tracing::warn!("Input does not exist: {:?}", path);
    }
    if missing.len() == inputs.len() {
        anyhow::bail!(
            "None of the inputs exist\n\n  Hint: Check the file paths and try again."
        );
    }

    Ok(LoadRequest::from_inputs(&inputs))
}

/// Open the `--report` file, if one was requested.
pub fn open_report(args: &ResizeArgs) -> anyhow::Result<Option<ReportSink>> {
    let Some(path) = &args.report else {
        return Ok(None);
    };
    let format = args
        .report_format
        .map(ReportFormat::from)
        .unwrap_or_else(|| ReportFormat::for_path(path));
    let file = File::create(path)
        .map_err(|e| anyhow::anyhow!("Cannot create report file {:?}: {}", path, e))?;
    Ok(Some(ReportWriter::new(BufWriter::new(file), format, true)))
}
