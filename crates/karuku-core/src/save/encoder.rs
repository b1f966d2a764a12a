//! Encoder settings and the codec invocation behind them.
//!
//! `build_encoder_settings` is the single place that maps
//! (format, quality, codec knobs) to encoder parameters.

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage, ExtendedColorType, ImageEncoder};
use serde::Serialize;

use crate::error::PipelineError;

use super::format::OutputFormat;

/// Highest JPEG quality passed to the encoder for real saves.
const JPEG_MAX_QUALITY: u8 = 95;
/// Highest JPEG quality used for previews.
const JPEG_PREVIEW_MAX_QUALITY: u8 = 85;
/// PNG compression effort cap for previews.
const PNG_PREVIEW_MAX_LEVEL: u8 = 1;

/// Parameter bag for one encode.
///
/// JPEG `optimize`/`progressive` and lossy WebP `quality`/`method` are
/// recorded for reports but not applied by the current encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum EncoderSettings {
    Jpeg {
        quality: u8,
        optimize: bool,
        progressive: bool,
    },
    Png {
        compress_level: u8,
        optimize: bool,
    },
    #[serde(rename = "webp")]
    WebP {
        quality: u8,
        method: u8,
        lossless: bool,
    },
    Avif {
        quality: u8,
        speed: u8,
    },
}

impl EncoderSettings {
    /// The format these settings encode.
    pub fn format(&self) -> OutputFormat {
        match self {
            EncoderSettings::Jpeg { .. } => OutputFormat::Jpeg,
            EncoderSettings::Png { .. } => OutputFormat::Png,
            EncoderSettings::WebP { .. } => OutputFormat::WebP,
            EncoderSettings::Avif { .. } => OutputFormat::Avif,
        }
    }
}

/// Clamp to 5..=100 and round to the nearest multiple of 5.
pub fn normalize_quality(value: i32) -> u8 {
    let clamped = value.clamp(5, 100);
    let rounded = ((clamped + 2) / 5) * 5;
    rounded.clamp(5, 100) as u8
}

/// Clamp a WebP method to 0..=6.
pub fn normalize_webp_method(value: i32) -> u8 {
    value.clamp(0, 6) as u8
}

/// Clamp an AVIF speed to 0..=10.
pub fn normalize_avif_speed(value: i32) -> u8 {
    value.clamp(0, 10) as u8
}

/// PNG compression level (0-9) derived from a quality value.
fn png_compress_level(quality: u8) -> u8 {
    let level = (f64::from(100 - quality) / 100.0 * 9.0).round_ties_even();
    level.clamp(0.0, 9.0) as u8
}

/// Build encoder parameters for `format`.
///
/// `for_preview` trades fidelity for speed: lower JPEG quality cap, no
/// optimize/progressive passes and minimal PNG compression effort.
pub fn build_encoder_settings(
    format: OutputFormat,
    quality: i32,
    webp_method: i32,
    webp_lossless: bool,
    avif_speed: i32,
    for_preview: bool,
) -> EncoderSettings {
    let quality = normalize_quality(quality);
    match format {
        OutputFormat::Jpeg => {
            let cap = if for_preview {
                JPEG_PREVIEW_MAX_QUALITY
            } else {
                JPEG_MAX_QUALITY
            };
            EncoderSettings::Jpeg {
                quality: quality.min(cap),
                optimize: !for_preview,
                progressive: !for_preview,
            }
        }
        OutputFormat::Png => {
            let level = png_compress_level(quality);
            EncoderSettings::Png {
                compress_level: if for_preview {
                    level.min(PNG_PREVIEW_MAX_LEVEL)
                } else {
                    level
                },
                optimize: !for_preview,
            }
        }
        OutputFormat::WebP => EncoderSettings::WebP {
            quality,
            method: normalize_webp_method(webp_method),
            lossless: webp_lossless,
        },
        OutputFormat::Avif => EncoderSettings::Avif {
            quality,
            speed: normalize_avif_speed(avif_speed),
        },
    }
}

/// Flatten an image to 8-bit samples the target encoder accepts.
fn encodable_pixels(image: &DynamicImage, keep_alpha: bool) -> (Vec<u8>, ExtendedColorType) {
    match (image.color(), keep_alpha) {
        (ColorType::L8, _) => (image.to_luma8().into_raw(), ExtendedColorType::L8),
        (ColorType::La8, true) => (image.to_luma_alpha8().into_raw(), ExtendedColorType::La8),
        (ColorType::La8, false) => (image.to_luma8().into_raw(), ExtendedColorType::L8),
        (color, true) if color.has_alpha() => {
            (image.to_rgba8().into_raw(), ExtendedColorType::Rgba8)
        }
        _ => (image.to_rgb8().into_raw(), ExtendedColorType::Rgb8),
    }
}

fn encode_error(format: OutputFormat, source: image::ImageError) -> PipelineError {
    PipelineError::Encode {
        format: format.to_string(),
        source,
    }
}

/// Encode `image` into an in-memory container.
///
/// The pure-Rust JPEG encoder always writes baseline Huffman-optimized
/// output, so `optimize`/`progressive` only affect which path is taken by
/// callers that care. Lossy WebP has no pure-Rust encoder; WebP output is
/// written losslessly and `quality`/`method` are ignored there.
pub fn encode_image(
    image: &DynamicImage,
    settings: &EncoderSettings,
) -> Result<Vec<u8>, PipelineError> {
    let (width, height) = (image.width(), image.height());
    let mut buffer = Vec::new();

    match *settings {
        EncoderSettings::Jpeg { quality, .. } => {
            let (pixels, color) = encodable_pixels(image, false);
            JpegEncoder::new_with_quality(&mut buffer, quality)
                .write_image(&pixels, width, height, color)
                .map_err(|e| encode_error(OutputFormat::Jpeg, e))?;
        }
        EncoderSettings::Png { compress_level, .. } => {
            let compression = match compress_level {
                0..=2 => CompressionType::Fast,
                3..=6 => CompressionType::Default,
                _ => CompressionType::Best,
            };
            let (pixels, color) = encodable_pixels(image, true);
            PngEncoder::new_with_quality(&mut buffer, compression, FilterType::Adaptive)
                .write_image(&pixels, width, height, color)
                .map_err(|e| encode_error(OutputFormat::Png, e))?;
        }
        EncoderSettings::WebP { .. } => encode_webp(image, &mut buffer)?,
        EncoderSettings::Avif { quality, speed } => encode_avif(image, quality, speed, &mut buffer)?,
    }

    Ok(buffer)
}

#[cfg(feature = "webp")]
fn encode_webp(image: &DynamicImage, buffer: &mut Vec<u8>) -> Result<(), PipelineError> {
    use image::codecs::webp::WebPEncoder;

    let (pixels, color) = encodable_pixels(image, true);
    let (pixels, color) = match color {
        ExtendedColorType::L8 | ExtendedColorType::La8 => {
            let rgba = image.color().has_alpha();
            if rgba {
                (image.to_rgba8().into_raw(), ExtendedColorType::Rgba8)
            } else {
                (image.to_rgb8().into_raw(), ExtendedColorType::Rgb8)
            }
        }
        _ => (pixels, color),
    };
    WebPEncoder::new_lossless(buffer)
        .write_image(&pixels, image.width(), image.height(), color)
        .map_err(|e| encode_error(OutputFormat::WebP, e))
}

#[cfg(not(feature = "webp"))]
fn encode_webp(_image: &DynamicImage, _buffer: &mut Vec<u8>) -> Result<(), PipelineError> {
    Err(unsupported_encoder(OutputFormat::WebP))
}

#[cfg(feature = "avif")]
fn encode_avif(
    image: &DynamicImage,
    quality: u8,
    speed: u8,
    buffer: &mut Vec<u8>,
) -> Result<(), PipelineError> {
    use image::codecs::avif::AvifEncoder;

    let (pixels, color) = if image.color().has_alpha() {
        (image.to_rgba8().into_raw(), ExtendedColorType::Rgba8)
    } else {
        (image.to_rgb8().into_raw(), ExtendedColorType::Rgb8)
    };
    // rav1e speed range starts at 1
    AvifEncoder::new_with_speed_quality(buffer, speed.max(1), quality)
        .write_image(&pixels, image.width(), image.height(), color)
        .map_err(|e| encode_error(OutputFormat::Avif, e))
}

#[cfg(not(feature = "avif"))]
fn encode_avif(
    _image: &DynamicImage,
    _quality: u8,
    _speed: u8,
    _buffer: &mut Vec<u8>,
) -> Result<(), PipelineError> {
    Err(unsupported_encoder(OutputFormat::Avif))
}

#[cfg(any(not(feature = "webp"), not(feature = "avif")))]
fn unsupported_encoder(format: OutputFormat) -> PipelineError {
    use image::error::{ImageFormatHint, UnsupportedError};

    encode_error(
        format,
        image::ImageError::Unsupported(UnsupportedError::from(ImageFormatHint::Name(
            format.to_string(),
        ))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_quality_rounds_to_five() {
        assert_eq!(normalize_quality(42), 40);
        assert_eq!(normalize_quality(43), 45);
        assert_eq!(normalize_quality(85), 85);
        assert_eq!(normalize_quality(97), 95);
        assert_eq!(normalize_quality(98), 100);
    }

    #[test]
    fn test_normalize_quality_clamps() {
        assert_eq!(normalize_quality(-20), 5);
        assert_eq!(normalize_quality(0), 5);
        assert_eq!(normalize_quality(6), 5);
        assert_eq!(normalize_quality(8), 10);
        assert_eq!(normalize_quality(250), 100);
    }

    #[test]
    fn test_normalize_quality_output_domain() {
        for v in -50..200 {
            let q = normalize_quality(v);
            assert!((5..=100).contains(&q), "{v} -> {q}");
            assert_eq!(q % 5, 0, "{v} -> {q}");
        }
    }

    #[test]
    fn test_codec_knob_clamps() {
        assert_eq!(normalize_webp_method(-1), 0);
        assert_eq!(normalize_webp_method(9), 6);
        assert_eq!(normalize_avif_speed(11), 10);
        assert_eq!(normalize_avif_speed(4), 4);
    }

    #[test]
    fn test_jpeg_quality_capped() {
        let settings = build_encoder_settings(OutputFormat::Jpeg, 100, 6, false, 6, false);
        assert_eq!(
            settings,
            EncoderSettings::Jpeg {
                quality: 95,
                optimize: true,
                progressive: true
            }
        );

        let preview = build_encoder_settings(OutputFormat::Jpeg, 100, 6, false, 6, true);
        assert_eq!(
            preview,
            EncoderSettings::Jpeg {
                quality: 85,
                optimize: false,
                progressive: false
            }
        );
    }

    #[test]
    fn test_png_level_from_quality() {
        let level = |q| match build_encoder_settings(OutputFormat::Png, q, 6, false, 6, false) {
            EncoderSettings::Png { compress_level, .. } => compress_level,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(level(100), 0);
        assert_eq!(level(85), 1);
        assert_eq!(level(50), 4);
        assert_eq!(level(5), 9);
    }

    #[test]
    fn test_png_preview_lowers_effort() {
        let settings = build_encoder_settings(OutputFormat::Png, 5, 6, false, 6, true);
        assert_eq!(
            settings,
            EncoderSettings::Png {
                compress_level: 1,
                optimize: false
            }
        );
    }

    #[test]
    fn test_webp_and_avif_pass_through() {
        assert_eq!(
            build_encoder_settings(OutputFormat::WebP, 72, 9, true, 6, false),
            EncoderSettings::WebP {
                quality: 70,
                method: 6,
                lossless: true
            }
        );
        assert_eq!(
            build_encoder_settings(OutputFormat::Avif, 60, 6, false, 3, false),
            EncoderSettings::Avif {
                quality: 60,
                speed: 3
            }
        );
    }

    #[test]
    fn test_encode_jpeg_drops_alpha() {
        let image = DynamicImage::new_rgba8(16, 8);
        let settings = build_encoder_settings(OutputFormat::Jpeg, 80, 6, false, 6, false);
        let bytes = encode_image(&image, &settings).unwrap();
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn test_encode_png_keeps_alpha() {
        let image = DynamicImage::new_rgba8(8, 8);
        let settings = build_encoder_settings(OutputFormat::Png, 85, 6, false, 6, false);
        let bytes = encode_image(&image, &settings).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_jpeg_passes_do_not_change_output() {
        let image = DynamicImage::new_rgb8(8, 8);
        let full = EncoderSettings::Jpeg {
            quality: 80,
            optimize: true,
            progressive: true,
        };
        let plain = EncoderSettings::Jpeg {
            quality: 80,
            optimize: false,
            progressive: false,
        };
        assert_eq!(
            encode_image(&image, &full).unwrap(),
            encode_image(&image, &plain).unwrap()
        );
    }

    #[cfg(feature = "webp")]
    #[test]
    fn test_webp_quality_recorded_only() {
        let image = DynamicImage::new_rgb8(8, 8);
        let low = build_encoder_settings(OutputFormat::WebP, 20, 0, false, 6, false);
        let high = build_encoder_settings(OutputFormat::WebP, 95, 6, false, 6, false);
        assert_ne!(low, high);
        assert_eq!(
            encode_image(&image, &low).unwrap(),
            encode_image(&image, &high).unwrap()
        );
    }

    #[cfg(feature = "webp")]
    #[test]
    fn test_encode_webp() {
        let image = DynamicImage::new_rgb8(8, 8);
        let settings = build_encoder_settings(OutputFormat::WebP, 85, 6, false, 6, false);
        let bytes = encode_image(&image, &settings).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
    }
}
