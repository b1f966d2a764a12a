//! Worker -> coordinator message protocol.

use std::io;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::types::SourceImage;

/// One message from a background load worker.
///
/// Per worker: optional `ScanProgress`, then `ScanDone`, then one
/// `Loaded`/`LoadError` per candidate, then exactly one `Done`. `Fatal`
/// may appear anywhere before `Done`. Indices are 1-based.
#[derive(Debug)]
pub enum LoadMessage {
    ScanProgress {
        count: usize,
    },
    ScanDone {
        total: usize,
        reached_limit: bool,
    },
    Loaded {
        path: PathBuf,
        image: Box<SourceImage>,
        index: usize,
    },
    LoadError {
        path: PathBuf,
        error: String,
        index: usize,
    },
    Fatal {
        error: String,
    },
    Done {
        canceled: bool,
    },
}

impl LoadMessage {
    pub fn is_done(&self) -> bool {
        matches!(self, LoadMessage::Done { .. })
    }
}

/// Readable hint for common OS failures while opening an input file.
pub fn load_error_hint(error: &io::Error) -> Option<&'static str> {
    let code = error.raw_os_error();
    if cfg!(windows) {
        match code {
            Some(32) => return Some("file is in use by another process"),
            Some(206) => return Some("path is too long"),
            Some(2) | Some(3) => return Some("file does not exist"),
            Some(5) => return Some("access denied"),
            _ => {}
        }
    }
    match error.kind() {
        io::ErrorKind::NotFound => Some("file does not exist"),
        io::ErrorKind::PermissionDenied => Some("access denied"),
        _ if code == Some(5) || code == Some(13) => Some("access denied"),
        _ => None,
    }
}

/// `LoadError` text for a failed candidate: the path, the error and, for
/// OS failures, a readable hint.
pub fn load_error_detail(path: &Path, error: &PipelineError) -> String {
    let base = match error {
        // Stage errors already name the path
        PipelineError::Io { source, .. } => format!("{}: {}", path.display(), source),
        other => other.to_string(),
    };
    match error.io_error().and_then(load_error_hint) {
        Some(hint) => format!("{} ({})", base, hint),
        None => base,
    }
}
