//! Image decoding with format detection, limits and EXIF orientation.

use exif::{In, Tag};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;
use crate::save::SourceExif;
use crate::types::SourceImage;

/// Decodes candidate files into upright `SourceImage`s.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

impl ImageDecoder {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Read and decode one file.
    pub fn decode_file(&self, path: &Path) -> Result<SourceImage, PipelineError> {
        let metadata = std::fs::metadata(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let bytes = std::fs::read(path).map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.decode_bytes(&bytes, path)
    }

    /// Decode an in-memory file. `path` is used for errors and as a format
    /// hint when the content is not recognised.
    pub fn decode_bytes(&self, bytes: &[u8], path: &Path) -> Result<SourceImage, PipelineError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot detect image format: {}", e),
            })?;
        let format = match reader.format() {
            Some(f) => f,
            None => ImageFormat::from_path(path).map_err(|_| PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                format: path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("unknown")
                    .to_string(),
            })?,
        };

        let image = reader.decode().map_err(|e| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let max_dim = self.limits.max_image_dimension;
        if image.width() > max_dim || image.height() > max_dim {
            return Err(PipelineError::ImageTooLarge {
                path: path.to_path_buf(),
                width: image.width(),
                height: image.height(),
                max_dim,
            });
        }

        let exif = SourceExif::from_container(bytes);
        let orientation = exif.as_ref().and_then(orientation_of).unwrap_or(1);
        if orientation != 1 {
            tracing::debug!("{}: applying EXIF orientation {}", path.display(), orientation);
        }

        Ok(SourceImage {
            image: apply_orientation(image, orientation),
            format: Some(format),
            exif,
        })
    }
}

fn orientation_of(exif: &SourceExif) -> Option<u32> {
    let parsed = exif.parse().ok()?;
    parsed
        .get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

/// Transpose pixels so the image is upright for EXIF orientation `value`.
pub fn apply_orientation(image: DynamicImage, value: u32) -> DynamicImage {
    match value {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

/// Lowercase name of a decoded container format.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Avif => "avif",
        _ => "unknown",
    }
}
