//! Temp-file-then-rename writes and Windows long-path handling.

use rand::Rng;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::PipelineError;

/// Paths at or beyond this length get the extended-length prefix.
const WINDOWS_LONG_PATH_THRESHOLD: usize = 240;

/// Hidden sibling of `target` used as the write destination before the rename.
///
/// Layout: `.{name}.{pid}_{nanos}_{hex10}.tmp`.
pub fn build_temp_save_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let suffix: u64 = rand::thread_rng().gen_range(0..(1u64 << 40));
    let temp_name = format!(".{}.{}_{}_{:010x}.tmp", name, std::process::id(), nanos, suffix);
    target.with_file_name(temp_name)
}

/// Whether `file_name` looks like a temp file produced by `build_temp_save_path`.
pub fn is_temp_save_name(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.ends_with(".tmp") && file_name.contains('_')
}

/// Add the `\\?\` (or `\\?\UNC\`) prefix to a long absolute Windows path.
///
/// Pure string transform so it can be tested on any host. Short paths,
/// already-prefixed paths and non-Windows paths are returned unchanged.
pub fn normalize_windows_long_path_str(path: &str) -> String {
    if path.starts_with(r"\\?\") {
        return path.to_string();
    }
    let is_unc = path.starts_with(r"\\");
    let is_drive = path.len() >= 3
        && path.as_bytes()[0].is_ascii_alphabetic()
        && path.as_bytes()[1] == b':'
        && matches!(path.as_bytes()[2], b'\\' | b'/');
    if !(is_unc || is_drive) || path.chars().count() < WINDOWS_LONG_PATH_THRESHOLD {
        return path.to_string();
    }

    let normalized = path.replace('/', r"\");
    if is_unc {
        format!(r"\\?\UNC\{}", &normalized[2..])
    } else {
        format!(r"\\?\{}", normalized)
    }
}

/// Path actually handed to the OS for a write.
pub fn normalize_windows_long_path(path: &Path) -> PathBuf {
    if !cfg!(windows) {
        return path.to_path_buf();
    }
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    PathBuf::from(normalize_windows_long_path_str(&absolute.to_string_lossy()))
}

fn io_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to `target` through a same-directory temp file.
///
/// The temp file is removed on every failure path.
pub fn save_with_atomic_replace(target: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    write_with_atomic_replace(target, |file| file.write_all(bytes))
}

/// Like `save_with_atomic_replace`, with the content produced by `write_fn`.
pub fn write_with_atomic_replace<F>(target: &Path, write_fn: F) -> Result<(), PipelineError>
where
    F: FnOnce(&mut File) -> std::io::Result<()>,
{
    let temp_path = build_temp_save_path(target);
    let os_temp = normalize_windows_long_path(&temp_path);
    let os_target = normalize_windows_long_path(target);

    let result = (|| {
        let mut file = File::create(&os_temp).map_err(|e| io_error(target, e))?;
        write_fn(&mut file).map_err(|e| io_error(target, e))?;
        file.sync_all().map_err(|e| io_error(target, e))?;
        drop(file);
        fs::rename(&os_temp, &os_target).map_err(|e| io_error(target, e))
    })();

    if result.is_err() {
        if let Err(e) = fs::remove_file(&os_temp) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Could not remove temp file {:?}: {}", temp_path, e);
            }
        }
    }
    result
}
