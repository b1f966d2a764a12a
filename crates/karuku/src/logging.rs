//! Logging initialization and configuration.
//!
//! Uses `tracing` with a human-readable or JSON formatter on stderr.
//! Only karuku's own crates log at the chosen level; dependencies are held
//! at `warn` unless RUST_LOG says otherwise.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Filter directives for karuku's crates at `level`, everything else at warn.
fn default_directives(level: &str) -> String {
    format!("warn,karuku={level},karuku_core={level}")
}

/// Effective level from `--verbose` and the config's `logging.level`.
///
/// `--verbose` raises anything quieter than debug to debug. Unknown config
/// values fall back to info.
fn effective_level(verbose: bool, configured: &str) -> &'static str {
    let configured = configured.trim().to_ascii_lowercase();
    let level = LEVELS
        .iter()
        .copied()
        .find(|l| *l == configured)
        .unwrap_or("info");
    if verbose && level != "trace" {
        "debug"
    } else {
        level
    }
}

/// Initialize the logging subsystem.
///
/// Log output goes to stderr (stdout is reserved for data output) and the
/// RUST_LOG environment variable overrides the default directives.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the config file's `[logging]` table.
///
/// `--verbose` and `--json-logs` take precedence over `logging.level` and
/// `logging.format = "json"`.
pub fn init_from_config(
    config: &karuku_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let level = effective_level(verbose_override, &config.logging.level);
    let json_format = json_logs_override || config.logging.format == "json";
    init(level, json_format);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_name_karuku_crates() {
        assert_eq!(
            default_directives("debug"),
            "warn,karuku=debug,karuku_core=debug"
        );
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }

    #[test]
    fn verbose_raises_to_debug() {
        assert_eq!(effective_level(false, "info"), "info");
        assert_eq!(effective_level(true, "info"), "debug");
        assert_eq!(effective_level(true, "error"), "debug");
        assert_eq!(effective_level(true, "trace"), "trace");
        assert_eq!(effective_level(false, " WARN "), "warn");
        assert_eq!(effective_level(false, "loud"), "info");
    }
}
