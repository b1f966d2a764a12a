//! Output naming: unique batch names, Windows filename rules, directory
//! preflight and path-length checks.

use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::OutputDirError;

use super::format::{destination_with_extension, OutputFormat};

const FORBIDDEN_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

const WINDOWS_RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Stems longer than this are shortened and suffixed with a digest.
const MAX_STEM_CHARS: usize = 72;
const SHORT_STEM_CHARS: usize = 60;

/// Paths longer than this are reported as risky on Windows.
const RISKY_PATH_CHARS: usize = 220;

const BATCH_SUFFIX: &str = "_resized";

/// Replace runs of forbidden characters with `_` and trim spaces/dots.
/// An empty result becomes `image`.
pub fn sanitize_stem(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut in_run = false;
    for c in stem.trim().chars() {
        if FORBIDDEN_CHARS.contains(&c) {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        "image".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Sanitized stem, shortened to `first60_<8 hex>` when too long.
fn batch_stem(stem: &str) -> String {
    let safe = sanitize_stem(stem);
    if safe.chars().count() <= MAX_STEM_CHARS {
        return safe;
    }
    let digest = blake3::hash(safe.as_bytes()).to_hex();
    let head: String = safe.chars().take(SHORT_STEM_CHARS).collect();
    format!("{}_{}", head, &digest.as_str()[..8])
}

/// Extension-less output path for one batch item.
///
/// Tries `{stem}_resized`, then `{stem}_resized_1`, `_2`, ... until the
/// format-correct destination does not exist. A dry run never probes the
/// filesystem.
pub fn build_unique_batch_base_path(
    output_dir: &Path,
    stem: &str,
    format: OutputFormat,
    dry_run: bool,
) -> PathBuf {
    let stem = batch_stem(stem);
    let base = output_dir.join(format!("{}{}", stem, BATCH_SUFFIX));
    if dry_run {
        return base;
    }

    let mut candidate = base;
    let mut index = 1;
    while destination_with_extension(&candidate, format).exists() {
        candidate = output_dir.join(format!("{}{}_{}", stem, BATCH_SUFFIX, index));
        index += 1;
    }
    candidate
}

/// Windows filename rules applied to a stem: forbidden characters and
/// reserved device names. Returns `None` when the stem is already fine.
pub fn normalize_windows_file_stem(stem: &str) -> Option<String> {
    let mut clean = sanitize_stem(stem);
    if WINDOWS_RESERVED_NAMES.contains(&clean.to_uppercase().as_str()) {
        clean.push('_');
    }
    (clean != stem).then_some(clean)
}

/// Adjust `path` to Windows filename rules.
///
/// Returns the (possibly) adjusted path and a notice when it changed.
/// A no-op on other platforms.
pub fn normalize_windows_output_filename(path: &Path) -> (PathBuf, Option<String>) {
    if !cfg!(windows) {
        return (path.to_path_buf(), None);
    }
    normalize_output_filename(path)
}

fn normalize_output_filename(path: &Path) -> (PathBuf, Option<String>) {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match normalize_windows_file_stem(&stem) {
        Some(clean) => {
            let name = match path.extension() {
                Some(ext) => format!("{}.{}", clean, ext.to_string_lossy()),
                None => clean,
            };
            (
                path.with_file_name(name),
                Some("Output name adjusted to Windows filename rules.".to_string()),
            )
        }
        None => (path.to_path_buf(), None),
    }
}

/// Whether a path string is long enough to risk legacy Windows APIs.
pub fn path_length_risky(path: &str) -> bool {
    let path = path.strip_prefix(r"\\?\").unwrap_or(path);
    path.chars().count() > RISKY_PATH_CHARS
}

/// `path_length_risky` on Windows, always false elsewhere.
pub fn is_windows_path_length_risky(path: &Path) -> bool {
    cfg!(windows) && path_length_risky(&path.to_string_lossy())
}

/// Check that `output_path` can be written before encoding anything.
pub fn preflight_output_path(
    output_path: &Path,
    create_if_missing: bool,
) -> Result<(), OutputDirError> {
    if output_path.is_dir() {
        return Err(OutputDirError::TargetIsDirectory(output_path.to_path_buf()));
    }

    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !parent.exists() {
        if !create_if_missing {
            return Err(OutputDirError::ParentMissing(parent));
        }
        fs::create_dir_all(&parent).map_err(|source| OutputDirError::NotWritable {
            path: parent.clone(),
            source,
        })?;
    }
    if !parent.is_dir() {
        return Err(OutputDirError::NotADirectory(parent));
    }

    probe_writable(&parent)
}

/// `preflight_output_path` for a directory that will receive many files.
pub fn preflight_output_directory(
    directory: &Path,
    create_if_missing: bool,
) -> Result<(), OutputDirError> {
    preflight_output_path(&directory.join(".karuku_dir_probe"), create_if_missing)
}

fn probe_writable(directory: &Path) -> Result<(), OutputDirError> {
    let token: u32 = rand::thread_rng().gen();
    let probe = directory.join(format!(".karuku_probe_{}_{:08x}", std::process::id(), token));
    fs::File::create_new(&probe).map_err(|source| OutputDirError::NotWritable {
        path: directory.to_path_buf(),
        source,
    })?;
    if let Err(e) = fs::remove_file(&probe) {
        tracing::warn!("Could not remove probe file {:?}: {}", probe, e);
    }
    Ok(())
}
