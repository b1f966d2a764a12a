//! Error types for the Karuku load/save pipeline.
//!
//! Errors are organized by stage. Below the save boundary everything is a
//! `Result`; `save::pipeline::save_image` is the only place that turns an
//! error into data (a failed `SaveResult`).

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for Karuku operations.
#[derive(Error, Debug)]
pub enum KarukuError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// File exceeds size limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {path} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        path: PathBuf,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {path}: {format}")]
    UnsupportedFormat { path: PathBuf, format: String },

    /// Encoding the output image failed
    #[error("Encode error ({format}): {source}")]
    Encode {
        format: String,
        #[source]
        source: image::ImageError,
    },

    /// Attaching the EXIF block to the encoded container failed
    #[error("EXIF embed failed ({format}): {message}")]
    ExifEmbed { format: String, message: String },

    /// Filesystem operation failed
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Output-location problems found before any encoding starts.
#[derive(Error, Debug)]
pub enum OutputDirError {
    /// The target path is an existing directory
    #[error("Output target {0} is an existing directory; choose a file name")]
    TargetIsDirectory(PathBuf),

    /// The parent directory does not exist and creation was not requested
    #[error("Output directory {0} does not exist")]
    ParentMissing(PathBuf),

    /// The parent exists but is not a directory
    #[error("Output location {0} is not a directory")]
    NotADirectory(PathBuf),

    /// Creating or probing the directory failed
    #[error("Output directory {path} is not writable: {source}")]
    NotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// The underlying OS error, if this failure came from the filesystem.
    ///
    /// Encoder errors that wrap an I/O failure are unwrapped too, so the
    /// classifier sees the real errno/winerror.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            PipelineError::Io { source, .. } => Some(source),
            PipelineError::Encode {
                source: image::ImageError::IoError(e),
                ..
            } => Some(e),
            _ => None,
        }
    }
}

/// Convenience type alias for Karuku results.
pub type Result<T> = std::result::Result<T, KarukuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_exposed_for_classification() {
        let err = PipelineError::Io {
            path: PathBuf::from("out.jpg"),
            source: std::io::Error::from_raw_os_error(28),
        };
        assert_eq!(err.io_error().and_then(|e| e.raw_os_error()), Some(28));
    }

    #[test]
    fn test_encode_error_unwraps_inner_io() {
        let err = PipelineError::Encode {
            format: "jpeg".into(),
            source: image::ImageError::IoError(std::io::Error::from_raw_os_error(13)),
        };
        assert_eq!(err.io_error().and_then(|e| e.raw_os_error()), Some(13));
    }

    #[test]
    fn test_exif_embed_has_no_io_error() {
        let err = PipelineError::ExifEmbed {
            format: "avif".into(),
            message: "unsupported container".into(),
        };
        assert!(err.io_error().is_none());
        assert!(err.to_string().contains("avif"));
    }
}
