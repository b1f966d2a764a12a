//! EXIF policy: which metadata survives into the output.
//!
//! `build_exif` and `preview_exif_plan` share the same decision code, so a
//! preview always matches what a real save would attach.

use exif::experimental::Writer;
use exif::{Context, Exif, Field, In, Reader, Tag, Value};
use serde::Serialize;
use std::io::Cursor;

use crate::error::PipelineError;

use super::format::OutputFormat;
use super::options::{ExifEditValues, ExifMode};

/// Character-code header for an ASCII `UserComment`.
const USER_COMMENT_ASCII_HEADER: &[u8; 8] = b"ASCII\0\0\0";

/// Tags describing IFD layout or image data offsets; the writer
/// regenerates or rejects them.
const STRUCTURAL_TAGS: [Tag; 9] = [
    Tag::ExifIFDPointer,
    Tag::GPSInfoIFDPointer,
    Tag::InteropIFDPointer,
    Tag::StripOffsets,
    Tag::StripByteCounts,
    Tag::TileOffsets,
    Tag::TileByteCounts,
    Tag::JPEGInterchangeFormat,
    Tag::JPEGInterchangeFormatLength,
];

pub(crate) fn is_structural_tag(tag: Tag) -> bool {
    STRUCTURAL_TAGS.contains(&tag)
}

/// Raw EXIF (TIFF) bytes captured from a decoded source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceExif {
    raw: Vec<u8>,
}

impl SourceExif {
    /// Wrap raw TIFF-structured EXIF bytes (no `Exif\0\0` prefix).
    pub fn from_raw(raw: Vec<u8>) -> Self {
        Self { raw }
    }

    /// Read the EXIF block embedded in an image file's bytes, if any.
    pub fn from_container(bytes: &[u8]) -> Option<Self> {
        let mut cursor = Cursor::new(bytes);
        match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => Some(Self::from_raw(exif.buf().to_vec())),
            Err(e) => {
                tracing::trace!("no readable EXIF: {}", e);
                None
            }
        }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Parse the block.
    pub fn parse(&self) -> Result<Exif, exif::Error> {
        Reader::new().read_raw(self.raw.clone())
    }
}

/// What the EXIF policy decided for one image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExifBuildMeta {
    pub had_source_exif: bool,
    pub exif_requested: bool,
    pub gps_removed: bool,
    pub edited_fields: Vec<String>,
    pub skipped_reason: Option<String>,
}

/// Read-only preview of the EXIF plan, shown before committing a save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExifPreview {
    pub exif_mode: ExifMode,
    pub had_source_exif: bool,
    pub source_tag_count: usize,
    pub source_has_gps: bool,
    pub exif_will_be_attached: bool,
    pub exif_requested: bool,
    pub gps_removed: bool,
    pub edited_fields: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<String>,
}

/// Source fields that can be carried into a rewritten block.
struct SourceFields {
    fields: Vec<Field>,
    little_endian: bool,
}

impl SourceFields {
    fn empty() -> Self {
        Self {
            fields: Vec::new(),
            little_endian: true,
        }
    }

    fn read(source: Option<&SourceExif>) -> Result<Self, exif::Error> {
        let Some(source) = source else {
            return Ok(Self::empty());
        };
        let exif = source.parse()?;
        let fields = exif
            .fields()
            .filter(|f| f.ifd_num == In::PRIMARY && !is_structural_tag(f.tag))
            .cloned()
            .collect();
        Ok(Self {
            fields,
            little_endian: exif.little_endian(),
        })
    }

    fn has_gps(&self) -> bool {
        self.fields.iter().any(|f| f.tag.context() == Context::Gps)
    }
}

fn ascii_field(tag: Tag, text: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![to_ascii_lossy(text)]),
    }
}

/// Non-ASCII characters become `?`.
fn to_ascii_lossy(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
        .collect()
}

fn set_field(fields: &mut Vec<Field>, field: Field) {
    fields.retain(|f| f.tag != field.tag);
    fields.push(field);
}

/// Apply non-blank edit values; returns the names of the edited fields.
fn apply_edits(fields: &mut Vec<Field>, values: &ExifEditValues) -> Vec<String> {
    let values = values.cleaned();
    let mut edited = Vec::new();

    if let Some(artist) = &values.artist {
        set_field(fields, ascii_field(Tag::Artist, artist));
        edited.push("Artist".to_string());
    }
    if let Some(copyright) = &values.copyright_text {
        set_field(fields, ascii_field(Tag::Copyright, copyright));
        edited.push("Copyright".to_string());
    }
    if let Some(datetime) = &values.datetime_original {
        set_field(fields, ascii_field(Tag::DateTimeOriginal, datetime));
        edited.push("DateTimeOriginal".to_string());
    }
    if let Some(comment) = &values.user_comment {
        let mut data = USER_COMMENT_ASCII_HEADER.to_vec();
        data.extend(to_ascii_lossy(comment));
        set_field(
            fields,
            Field {
                tag: Tag::UserComment,
                ifd_num: In::PRIMARY,
                value: Value::Undefined(data, 0),
            },
        );
        edited.push("UserComment".to_string());
    }

    edited
}

fn serialize(fields: &[Field], little_endian: bool) -> Result<Vec<u8>, exif::Error> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, little_endian)?;
    Ok(buf.into_inner())
}

/// Compute the EXIF block to attach to the output.
///
/// Returns `None` bytes when nothing should be attached; the reason (if
/// any) is in `ExifBuildMeta::skipped_reason`. Never fails.
pub fn build_exif(
    source: Option<&SourceExif>,
    mode: ExifMode,
    remove_gps: bool,
    edits: Option<&ExifEditValues>,
) -> (Option<Vec<u8>>, ExifBuildMeta) {
    if mode == ExifMode::Remove {
        return (None, ExifBuildMeta::default());
    }

    let source = match SourceFields::read(source) {
        Ok(source) => source,
        Err(e) => {
            tracing::debug!("source EXIF unreadable: {}", e);
            return (
                None,
                ExifBuildMeta {
                    skipped_reason: Some("exif-read-failed".to_string()),
                    ..Default::default()
                },
            );
        }
    };

    let had_source_exif = !source.fields.is_empty();
    if !had_source_exif && mode != ExifMode::Edit {
        return (None, ExifBuildMeta::default());
    }

    let little_endian = source.little_endian;
    let mut fields = source.fields;

    // Pixels are upright after decode
    fields.retain(|f| f.tag != Tag::Orientation);

    let mut gps_removed = false;
    if remove_gps && fields.iter().any(|f| f.tag.context() == Context::Gps) {
        fields.retain(|f| f.tag.context() != Context::Gps);
        gps_removed = true;
    }

    let edited_fields = match (mode, edits) {
        (ExifMode::Edit, Some(values)) => apply_edits(&mut fields, values),
        _ => Vec::new(),
    };

    if !had_source_exif && edited_fields.is_empty() && !gps_removed {
        return (None, ExifBuildMeta::default());
    }

    let mut meta = ExifBuildMeta {
        had_source_exif,
        exif_requested: true,
        gps_removed,
        edited_fields,
        skipped_reason: None,
    };

    match serialize(&fields, little_endian) {
        Ok(bytes) => (Some(bytes), meta),
        Err(e) => {
            tracing::warn!("EXIF serialization failed: {}", e);
            meta.skipped_reason = Some("exif-serialize-failed".to_string());
            (None, meta)
        }
    }
}

/// Skip reason for containers that cannot carry an EXIF block.
pub const EXIF_UNSUPPORTED_FORMAT: &str = "exif-unsupported-format";

/// `build_exif` for a concrete output container.
///
/// When `format` cannot carry EXIF the block is dropped here, so dry runs
/// and real saves report the same outcome.
pub fn build_exif_for_format(
    source: Option<&SourceExif>,
    mode: ExifMode,
    remove_gps: bool,
    edits: Option<&ExifEditValues>,
    format: OutputFormat,
) -> (Option<Vec<u8>>, ExifBuildMeta) {
    let (bytes, mut meta) = build_exif(source, mode, remove_gps, edits);
    if bytes.is_some() && !format.supports_exif() {
        meta.skipped_reason = Some(EXIF_UNSUPPORTED_FORMAT.to_string());
        return (None, meta);
    }
    (bytes, meta)
}

/// Preview what a save to `format` would do with the metadata.
pub fn preview_exif_plan(
    source: Option<&SourceExif>,
    mode: ExifMode,
    remove_gps: bool,
    edits: Option<&ExifEditValues>,
    format: OutputFormat,
) -> ExifPreview {
    let (source_tag_count, source_has_gps) = match SourceFields::read(source) {
        Ok(fields) => (fields.fields.len(), fields.has_gps()),
        Err(_) => (0, false),
    };

    let (bytes, meta) = build_exif_for_format(source, mode, remove_gps, edits, format);
    ExifPreview {
        exif_mode: mode,
        had_source_exif: source_tag_count > 0,
        source_tag_count,
        source_has_gps,
        exif_will_be_attached: bytes.is_some(),
        exif_requested: meta.exif_requested,
        gps_removed: meta.gps_removed,
        edited_fields: meta.edited_fields,
        skipped_reason: meta.skipped_reason,
    }
}

/// Insert a TIFF-structured EXIF block into an encoded container.
pub fn embed_exif(
    encoded: Vec<u8>,
    format: OutputFormat,
    exif: &[u8],
) -> Result<Vec<u8>, PipelineError> {
    use img_parts::{Bytes, ImageEXIF};

    let embed_error = |message: String| PipelineError::ExifEmbed {
        format: format.to_string(),
        message,
    };
    let exif = Some(Bytes::copy_from_slice(exif));
    let input = Bytes::from(encoded);
    let mut out = Vec::new();

    let written = match format {
        OutputFormat::Jpeg => {
            let mut jpeg = img_parts::jpeg::Jpeg::from_bytes(input)
                .map_err(|e| embed_error(e.to_string()))?;
            jpeg.set_exif(exif);
            jpeg.encoder().write_to(&mut out)
        }
        OutputFormat::Png => {
            let mut png = img_parts::png::Png::from_bytes(input)
                .map_err(|e| embed_error(e.to_string()))?;
            png.set_exif(exif);
            png.encoder().write_to(&mut out)
        }
        OutputFormat::WebP => {
            let mut webp = img_parts::webp::WebP::from_bytes(input)
                .map_err(|e| embed_error(e.to_string()))?;
            webp.set_exif(exif);
            webp.encoder().write_to(&mut out)
        }
        OutputFormat::Avif => {
            return Err(embed_error(
                "container does not support embedded EXIF".to_string(),
            ))
        }
    };
    written.map_err(|e| embed_error(e.to_string()))?;
    Ok(out)
}
