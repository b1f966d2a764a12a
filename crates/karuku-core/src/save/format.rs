//! Output format resolution.
//!
//! Pure functions: given the user's selection, the source image and the
//! codecs available in this build, decide the output format and extension.

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Formats the save pipeline can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    #[serde(rename = "webp")]
    WebP,
    Avif,
}

impl OutputFormat {
    /// Parse a format name (case-insensitive, "jpg" accepted).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            "avif" => Some(Self::Avif),
            _ => None,
        }
    }

    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    /// File extension (without the dot) written for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    /// Whether the container can carry an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        matches!(self, OutputFormat::Png | OutputFormat::WebP)
    }

    /// Whether an EXIF block can be embedded in the container.
    pub fn supports_exif(&self) -> bool {
        !matches!(self, OutputFormat::Avif)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The properties of a source image that matter for `auto` resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceTraits {
    /// The decoded pixels carry an alpha channel
    pub has_alpha: bool,
    /// The source container stores indexed (palette) colour
    pub indexed: bool,
}

impl SourceTraits {
    /// Traits of an already decoded image whose container is unknown.
    pub fn of_image(image: &DynamicImage) -> Self {
        Self {
            has_alpha: image.color().has_alpha(),
            indexed: false,
        }
    }

    /// Traits of an image decoded from `format`.
    pub fn of_decoded(image: &DynamicImage, format: Option<ImageFormat>) -> Self {
        Self {
            has_alpha: image.color().has_alpha(),
            indexed: matches!(format, Some(ImageFormat::Gif)),
        }
    }
}

/// Output formats this build can encode.
///
/// JPEG and PNG are always available; WebP and AVIF depend on the codec
/// features compiled into `image`.
pub fn supported_output_formats() -> Vec<OutputFormat> {
    let mut formats = vec![OutputFormat::Jpeg, OutputFormat::Png];
    if cfg!(feature = "webp") {
        formats.push(OutputFormat::WebP);
    }
    if cfg!(feature = "avif") {
        formats.push(OutputFormat::Avif);
    }
    formats
}

/// Whether `selected` is a value `resolve_output_format` understands.
pub fn is_known_selection(selected: &str) -> bool {
    selected.trim().eq_ignore_ascii_case("auto") || OutputFormat::parse(selected).is_some()
}

/// Decide the final output format.
///
/// `auto` picks PNG for sources with alpha or indexed colour, JPEG
/// otherwise. Unknown or unavailable selections fall back to JPEG.
pub fn resolve_output_format(
    selected: &str,
    source: SourceTraits,
    available: &[OutputFormat],
) -> OutputFormat {
    if selected.trim().eq_ignore_ascii_case("auto") {
        if source.has_alpha || source.indexed {
            return OutputFormat::Png;
        }
        return OutputFormat::Jpeg;
    }

    match OutputFormat::parse(selected) {
        Some(requested) if available.contains(&requested) => requested,
        Some(requested) => {
            tracing::debug!("{} encoder unavailable, falling back to jpeg", requested);
            OutputFormat::Jpeg
        }
        None => OutputFormat::Jpeg,
    }
}

/// Extensions treated as an existing image suffix by `destination_with_extension`.
const IMAGE_EXTENSIONS: [&str; 9] = ["jpg", "jpeg", "png", "webp", "avif", "gif", "bmp", "tif", "tiff"];

/// Give `path` the extension for `format`.
///
/// An existing image extension is replaced; any other dotted tail is part
/// of the name, so `photo.2024_resized` becomes `photo.2024_resized.jpg`.
pub fn destination_with_extension(path: &Path, format: OutputFormat) -> PathBuf {
    let has_image_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    if has_image_extension {
        return path.with_extension(format.extension());
    }
    match path.file_name() {
        Some(name) => path.with_file_name(format!(
            "{}.{}",
            name.to_string_lossy(),
            format.extension()
        )),
        None => path.with_extension(format.extension()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_PNG: &[OutputFormat] = &[OutputFormat::Jpeg, OutputFormat::Png];

    #[test]
    fn test_auto_picks_png_for_alpha() {
        let rgba = DynamicImage::new_rgba8(4, 4);
        let traits = SourceTraits::of_image(&rgba);
        assert_eq!(resolve_output_format("auto", traits, JPEG_PNG), OutputFormat::Png);
    }

    #[test]
    fn test_auto_picks_jpeg_for_opaque() {
        let rgb = DynamicImage::new_rgb8(4, 4);
        let traits = SourceTraits::of_image(&rgb);
        assert_eq!(resolve_output_format("auto", traits, JPEG_PNG), OutputFormat::Jpeg);
    }

    #[test]
    fn test_auto_picks_png_for_indexed_source() {
        let rgb = DynamicImage::new_rgb8(4, 4);
        let traits = SourceTraits::of_decoded(&rgb, Some(ImageFormat::Gif));
        assert_eq!(resolve_output_format("AUTO", traits, JPEG_PNG), OutputFormat::Png);
    }

    #[test]
    fn test_jpg_alias_and_case() {
        let traits = SourceTraits::default();
        assert_eq!(resolve_output_format("JPG", traits, JPEG_PNG), OutputFormat::Jpeg);
        assert_eq!(resolve_output_format("Png", traits, JPEG_PNG), OutputFormat::Png);
    }

    #[test]
    fn test_unavailable_format_falls_back_to_jpeg() {
        let traits = SourceTraits { has_alpha: true, indexed: false };
        assert_eq!(resolve_output_format("webp", traits, JPEG_PNG), OutputFormat::Jpeg);
        assert_eq!(resolve_output_format("avif", traits, JPEG_PNG), OutputFormat::Jpeg);
        assert_eq!(resolve_output_format("bmp", traits, JPEG_PNG), OutputFormat::Jpeg);
    }

    #[test]
    fn test_available_format_is_honoured() {
        let all = [
            OutputFormat::Jpeg,
            OutputFormat::Png,
            OutputFormat::WebP,
            OutputFormat::Avif,
        ];
        let traits = SourceTraits::default();
        assert_eq!(resolve_output_format("webp", traits, &all), OutputFormat::WebP);
        assert_eq!(resolve_output_format("avif", traits, &all), OutputFormat::Avif);
    }

    #[test]
    fn test_destination_with_extension() {
        let base = Path::new("/out/photo_resized");
        assert_eq!(
            destination_with_extension(base, OutputFormat::Jpeg),
            PathBuf::from("/out/photo_resized.jpg")
        );
        assert_eq!(
            destination_with_extension(Path::new("/out/a.jpeg"), OutputFormat::WebP),
            PathBuf::from("/out/a.webp")
        );
        assert_eq!(
            destination_with_extension(Path::new("b.PNG"), OutputFormat::Avif),
            PathBuf::from("b.avif")
        );
    }

    #[test]
    fn test_destination_keeps_dotted_stem() {
        assert_eq!(
            destination_with_extension(Path::new("/out/photo.2024_resized"), OutputFormat::Jpeg),
            PathBuf::from("/out/photo.2024_resized.jpg")
        );
        assert_eq!(
            destination_with_extension(Path::new("/out/a.v1_resized_2"), OutputFormat::Png),
            PathBuf::from("/out/a.v1_resized_2.png")
        );
        assert_ne!(
            destination_with_extension(Path::new("a.v1_resized"), OutputFormat::Jpeg),
            destination_with_extension(Path::new("a.v2_resized"), OutputFormat::Jpeg)
        );
    }

    #[test]
    fn test_only_avif_lacks_exif() {
        assert!(OutputFormat::Jpeg.supports_exif());
        assert!(OutputFormat::Png.supports_exif());
        assert!(OutputFormat::WebP.supports_exif());
        assert!(!OutputFormat::Avif.supports_exif());
    }

    #[test]
    fn test_supported_formats_always_include_jpeg_png() {
        let formats = supported_output_formats();
        assert!(formats.contains(&OutputFormat::Jpeg));
        assert!(formats.contains(&OutputFormat::Png));
    }

    #[test]
    fn test_known_selection() {
        assert!(is_known_selection("auto"));
        assert!(is_known_selection("jpg"));
        assert!(!is_known_selection("gif"));
    }
}
