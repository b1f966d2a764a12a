//! OS error classification for failed saves.
//!
//! Maps an I/O failure to `(code, category, retryable, guidance)`. The core
//! mapping is a pure function of the raw OS code and the platform family so
//! both tables can be tested on any host.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PipelineError;

/// Small taxonomy of save failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    SharingViolation,
    PathTooLong,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    PathInvalid,
    NoSpace,
    WindowsOsError,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::SharingViolation => "sharing_violation",
            ErrorCategory::PathTooLong => "path_too_long",
            ErrorCategory::PermissionDenied => "permission_denied",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::AlreadyExists => "already_exists",
            ErrorCategory::PathInvalid => "path_invalid",
            ErrorCategory::NoSpace => "no_space",
            ErrorCategory::WindowsOsError => "windows_os_error",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Only a sharing violation is worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::SharingViolation)
    }

    /// Advice suitable for direct display next to the failed item.
    pub fn guidance(&self) -> &'static str {
        match self {
            ErrorCategory::SharingViolation => {
                "The file is likely locked by another app or a sync client; retry after a few seconds."
            }
            ErrorCategory::PathTooLong => "Shorten the destination folder or file name.",
            ErrorCategory::PermissionDenied => {
                "Check the permissions of the destination file and folder."
            }
            ErrorCategory::NotFound => "The destination folder no longer exists; choose another.",
            ErrorCategory::AlreadyExists => "A file with that name already exists; pick another name.",
            ErrorCategory::PathInvalid => "The destination path is invalid; choose another folder.",
            ErrorCategory::NoSpace => "The destination looks full; free space or change the folder.",
            ErrorCategory::WindowsOsError | ErrorCategory::Unknown => {
                "Change the destination and try again."
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which error table an OS code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Posix,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Posix
        }
    }
}

/// Classification result carried into a failed `SaveResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorClassification {
    pub code: Option<i32>,
    pub category: ErrorCategory,
    pub retryable: bool,
    pub guidance: String,
}

impl ErrorClassification {
    fn new(code: Option<i32>, category: ErrorCategory) -> Self {
        Self {
            code,
            category,
            retryable: category.is_retryable(),
            guidance: category.guidance().to_string(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(None, ErrorCategory::Unknown)
    }
}

/// ENOENT, ENOTDIR, EISDIR, EINVAL, ENAMETOOLONG, ELOOP
const POSIX_INVALID_PATH: [i32; 6] = [2, 20, 21, 22, 36, 40];

/// Classify a raw OS error code.
pub fn classify_os_code(code: i32, family: OsFamily) -> ErrorClassification {
    let category = match family {
        OsFamily::Windows => match code {
            32 | 33 => ErrorCategory::SharingViolation,
            206 => ErrorCategory::PathTooLong,
            5 => ErrorCategory::PermissionDenied,
            2 => ErrorCategory::NotFound,
            183 | 80 => ErrorCategory::AlreadyExists,
            28 | 122 | 112 => ErrorCategory::NoSpace,
            _ => ErrorCategory::WindowsOsError,
        },
        OsFamily::Posix => match code {
            c if POSIX_INVALID_PATH.contains(&c) => ErrorCategory::PathInvalid,
            28 | 122 | 112 => ErrorCategory::NoSpace,
            13 | 5 | 30 => ErrorCategory::PermissionDenied,
            _ => ErrorCategory::Unknown,
        },
    };
    ErrorClassification::new(Some(code), category)
}

/// Classify an I/O error; errors without an OS code are `unknown`.
pub fn classify_io_error(error: &std::io::Error) -> ErrorClassification {
    match error.raw_os_error() {
        Some(code) => classify_os_code(code, OsFamily::current()),
        None => ErrorClassification::unknown(),
    }
}

/// Classify any pipeline failure.
pub fn classify(error: &PipelineError) -> ErrorClassification {
    error
        .io_error()
        .map(classify_io_error)
        .unwrap_or_else(ErrorClassification::unknown)
}
