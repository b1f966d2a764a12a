//! Human-readable EXIF summaries for the metadata panel / `--verbose` output.

use exif::{Exif, In, Tag, Value};
use serde::{Deserialize, Serialize};

use crate::save::exif::is_structural_tag;
use crate::save::SourceExif;

/// The subset of EXIF shown to users.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExifSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,

    /// Aperture (e.g., "f/1.8")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,

    /// Shutter speed (e.g., "1/1000")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,

    /// Focal length in mm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,

    /// Whether any GPS field is present
    pub has_gps: bool,

    /// Number of primary-image fields
    pub tag_count: usize,
}

/// Builds `ExifSummary` values and renders them as text.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Summarize a captured EXIF block. Returns `None` if it cannot be parsed.
    pub fn summarize(source: &SourceExif) -> Option<ExifSummary> {
        let exif = source.parse().ok()?;
        Some(Self::from_exif(&exif))
    }

    fn from_exif(exif: &Exif) -> ExifSummary {
        let primary = || {
            exif.fields()
                .filter(|f| f.ifd_num == In::PRIMARY && !is_structural_tag(f.tag))
        };
        ExifSummary {
            captured_at: Self::get_datetime(exif),
            camera_make: Self::get_string(exif, Tag::Make),
            camera_model: Self::get_string(exif, Tag::Model),
            lens_model: Self::get_string(exif, Tag::LensModel),
            aperture: Self::get_aperture(exif),
            shutter_speed: Self::get_shutter_speed(exif),
            iso: Self::get_u32(exif, Tag::PhotographicSensitivity),
            focal_length: Self::get_focal_length(exif),
            artist: Self::get_string(exif, Tag::Artist),
            copyright: Self::get_string(exif, Tag::Copyright),
            has_gps: primary().any(|f| f.tag.context() == exif::Context::Gps),
            tag_count: primary().count(),
        }
    }

    /// Multi-line text for display; "No EXIF" when nothing is known.
    pub fn render_text(summary: Option<&ExifSummary>) -> String {
        let Some(s) = summary.filter(|s| s.tag_count > 0) else {
            return "No EXIF".to_string();
        };

        let mut lines = Vec::new();
        let camera = [s.camera_make.as_deref(), s.camera_model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !camera.is_empty() {
            lines.push(format!("Camera: {}", camera));
        }
        if let Some(lens) = &s.lens_model {
            lines.push(format!("Lens: {}", lens));
        }
        if let Some(at) = &s.captured_at {
            lines.push(format!("Captured: {}", at));
        }

        let exposure: Vec<String> = [
            s.aperture.clone(),
            s.shutter_speed.as_ref().map(|v| format!("{} s", v)),
            s.iso.map(|v| format!("ISO {}", v)),
            s.focal_length.map(|v| format!("{:.0} mm", v)),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !exposure.is_empty() {
            lines.push(format!("Exposure: {}", exposure.join(", ")));
        }
        if let Some(artist) = &s.artist {
            lines.push(format!("Artist: {}", artist));
        }
        if let Some(copyright) = &s.copyright {
            lines.push(format!("Copyright: {}", copyright));
        }
        lines.push(format!("GPS: {}", if s.has_gps { "present" } else { "none" }));
        lines.push(format!("Tags: {}", s.tag_count));
        lines.join("\n")
    }

    fn get_string(exif: &Exif, tag: Tag) -> Option<String> {
        exif.get_field(tag, In::PRIMARY)
            .map(|f| f.display_value().to_string().trim_matches('"').trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn get_u32(exif: &Exif, tag: Tag) -> Option<u32> {
        exif.get_field(tag, In::PRIMARY).and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| x as u32),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
    }

    /// Prefers DateTimeOriginal over DateTime.
    fn get_datetime(exif: &Exif) -> Option<String> {
        Self::get_string(exif, Tag::DateTimeOriginal)
            .or_else(|| Self::get_string(exif, Tag::DateTime))
    }

    fn get_aperture(exif: &Exif) -> Option<String> {
        exif.get_field(Tag::FNumber, In::PRIMARY)
            .map(|f| format!("f/{}", f.display_value()))
    }

    fn get_shutter_speed(exif: &Exif) -> Option<String> {
        exif.get_field(Tag::ExposureTime, In::PRIMARY)
            .map(|f| f.display_value().to_string())
    }

    fn get_focal_length(exif: &Exif) -> Option<f32> {
        exif.get_field(Tag::FocalLength, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Rational(v) => v.first().map(|r| r.to_f64() as f32),
                _ => None,
            })
    }
}
