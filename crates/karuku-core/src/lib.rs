//! Karuku Core - resize, re-encode and persist images.
//!
//! Karuku takes decoded images, resizes them and writes them back to disk
//! under a quality, format and EXIF policy, with atomic writes and
//! classified OS errors. Loading and batch saving run on background
//! threads that talk to a polled coordinator through a bounded queue.
//!
//! # Architecture
//!
//! ```text
//! LoadSession -> LoadWorker (discover -> decode) -> LoadEvent::Loaded(ImageJob)
//! BatchSaveSession -> save_with_retry -> save_image
//!     save_image: resolve format -> EXIF policy -> encode -> atomic write
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use karuku_core::save::{save_image, OutputFormat, SaveOptions};
//! use karuku_core::load::ImageDecoder;
//!
//! let source = ImageDecoder::new(Default::default()).decode_file("in.jpg".as_ref())?;
//! let resized = "w800".parse::<karuku_core::ResizeSpec>()?.apply(&source.image);
//! let result = save_image(&source, &resized, "out".as_ref(), &SaveOptions::new(OutputFormat::Jpeg));
//! assert!(result.success);
//! ```

pub mod config;
pub mod error;
pub mod load;
pub mod metadata;
pub mod output;
pub mod resize;
pub mod save;
pub mod session;
pub mod types;

pub use config::Config;
pub use error::{ConfigError, KarukuError, OutputDirError, PipelineError, Result};
pub use load::{CancellationToken, ImageDecoder, LoadRequest};
pub use output::{ReportFormat, ReportWriter, SaveRecord};
pub use resize::ResizeSpec;
pub use save::{save_image, save_with_retry, OutputFormat, SaveOptions, SaveResult};
pub use session::{BatchSaveSession, LoadSession, OperationSummary};
pub use types::{ImageJob, ProcessState, SourceImage};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
