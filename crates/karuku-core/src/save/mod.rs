//! The save side: format resolution, encoding, EXIF policy, atomic writes,
//! error classification and the `save_image` entry point that ties them
//! together.

pub mod atomic;
pub mod classify;
pub mod encoder;
pub mod exif;
pub mod format;
pub mod naming;
pub mod options;
pub mod pipeline;
pub mod retry;

pub use classify::{classify, ErrorCategory, ErrorClassification};
pub use encoder::{build_encoder_settings, normalize_quality, EncoderSettings};
pub use exif::{
    build_exif, build_exif_for_format, preview_exif_plan, ExifBuildMeta, ExifPreview, SourceExif,
    EXIF_UNSUPPORTED_FORMAT,
};
pub use format::{
    destination_with_extension, resolve_output_format, supported_output_formats, OutputFormat,
    SourceTraits,
};
pub use options::{ExifEditValues, ExifMode, SaveOptions, SaveResult};
pub use pipeline::{save_image, save_with_retry};
pub use retry::{retry, RetryPolicy};
