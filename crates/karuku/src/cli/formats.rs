//! The `karuku formats` command: list the output formats this build can write.

use clap::Args;
use karuku_core::save::{supported_output_formats, OutputFormat};
use serde::Serialize;

/// Arguments for the `formats` command.
#[derive(Args, Debug)]
pub struct FormatsArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct FormatInfo {
    format: OutputFormat,
    extension: &'static str,
    alpha: bool,
    exif: bool,
}

fn describe(format: OutputFormat) -> FormatInfo {
    FormatInfo {
        format,
        extension: format.extension(),
        alpha: format.supports_alpha(),
        exif: format.supports_exif(),
    }
}

/// Execute the formats command.
pub async fn execute(args: FormatsArgs) -> anyhow::Result<()> {
    let formats: Vec<FormatInfo> = supported_output_formats().into_iter().map(describe).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&formats)?);
        return Ok(());
    }

    println!("{:<8} {:<6} {:<6} {}", "FORMAT", "EXT", "ALPHA", "EXIF");
    for info in &formats {
        println!(
            "{:<8} {:<6} {:<6} {}",
            info.format.as_str(),
            info.extension,
            if info.alpha { "yes" } else { "no" },
            if info.exif { "yes" } else { "no" },
        );
    }
    Ok(())
}
