//! Karuku CLI - batch image resizer with quality, format and EXIF policies.
//!
//! Karuku loads images from files and directories on a background worker,
//! resizes them and writes them back out atomically, keeping, stripping
//! or editing their EXIF metadata along the way.
//!
//! # Usage
//!
//! ```bash
//! # Resize a folder to 1600px wide JPEGs
//! karuku resize ./photos -o ./out --size w1600 --format jpeg
//!
//! # Strip metadata and write a JSON Lines report
//! karuku resize a.jpg b.png -o ./out --exif remove --report run.jsonl
//!
//! # Preview what a save would do with a file's EXIF
//! karuku exif-plan photo.jpg --remove-gps
//!
//! # View configuration
//! karuku config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Karuku - batch image resizer with quality, format and EXIF policies.
#[derive(Parser, Debug)]
#[command(name = "karuku")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "KARUKU_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load images, resize them and save them to an output directory
    Resize(cli::resize::ResizeArgs),

    /// Show what a save would do with a file's EXIF metadata (JSON)
    ExifPlan(cli::exif_plan::ExifPlanArgs),

    /// List the output formats this build can write
    Formats(cli::formats::FormatsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn load_config(path: Option<&PathBuf>) -> karuku_core::Config {
    let loaded = match path {
        Some(path) => karuku_core::Config::load_from(path),
        None => karuku_core::Config::load(),
    };
    match loaded {
        Ok(config) => config,
        Err(e) => {
            // Logging isn't initialized yet
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `karuku config path`."
            );
            karuku_core::Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref());
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Karuku v{}", karuku_core::VERSION);

    match cli.command {
        Commands::Resize(args) => cli::resize::execute(args, config).await,
        Commands::ExifPlan(args) => cli::exif_plan::execute(args, config).await,
        Commands::Formats(args) => cli::formats::execute(args).await,
        Commands::Config(args) => cli::config::execute(args, config).await,
    }
}
