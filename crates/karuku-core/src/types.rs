//! Core data types shared by the load and save sides.

use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::metadata::MetadataExtractor;
use crate::resize::ResizeSpec;
use crate::save::{SourceExif, SourceTraits};

pub use crate::metadata::ExifSummary;

/// A decoded source image plus what the save side needs to know about it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Upright pixels (EXIF orientation already applied)
    pub image: DynamicImage,
    /// Container the pixels were decoded from
    pub format: Option<ImageFormat>,
    /// Raw EXIF block of the source file
    pub exif: Option<SourceExif>,
}

impl SourceImage {
    /// Wrap pixels that did not come from a file.
    pub fn from_image(image: DynamicImage) -> Self {
        Self {
            image,
            format: None,
            exif: None,
        }
    }

    /// Properties used by `auto` format resolution.
    pub fn traits(&self) -> SourceTraits {
        SourceTraits::of_decoded(&self.image, self.format)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

/// Processing state of one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    #[default]
    Unprocessed,
    Success,
    Failed,
}

/// One image owned by the session layer.
///
/// Workers only hand over a freshly decoded `SourceImage`; everything else
/// is mutated by the single consuming thread.
#[derive(Debug)]
pub struct ImageJob {
    pub path: PathBuf,
    pub source: Arc<SourceImage>,
    resized: Option<(ResizeSpec, DynamicImage)>,
    pub state: ProcessState,
    pub last_error_detail: Option<String>,
    metadata_text: OnceLock<String>,
}

impl ImageJob {
    pub fn new(path: impl Into<PathBuf>, source: Arc<SourceImage>) -> Self {
        Self {
            path: path.into(),
            source,
            resized: None,
            state: ProcessState::Unprocessed,
            last_error_detail: None,
            metadata_text: OnceLock::new(),
        }
    }

    pub fn file_stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Resized pixels for `spec`, computed once per spec and cached.
    pub fn resized(&mut self, spec: ResizeSpec) -> &DynamicImage {
        let stale = !matches!(&self.resized, Some((cached, _)) if *cached == spec);
        if stale {
            let image = spec.apply(&self.source.image);
            self.resized = Some((spec, image));
        }
        match &self.resized {
            Some((_, image)) => image,
            None => &self.source.image,
        }
    }

    /// Drop the resize cache (e.g. after the target size changed).
    pub fn clear_resized(&mut self) {
        self.resized = None;
    }

    pub fn mark_success(&mut self) {
        self.state = ProcessState::Success;
        self.last_error_detail = None;
    }

    pub fn mark_failed(&mut self, detail: impl Into<String>) {
        self.state = ProcessState::Failed;
        self.last_error_detail = Some(detail.into());
    }

    /// Human-readable EXIF summary, rendered on first request.
    pub fn metadata_text(&self) -> &str {
        self.metadata_text.get_or_init(|| {
            let summary = self.source.exif.as_ref().and_then(MetadataExtractor::summarize);
            MetadataExtractor::render_text(summary.as_ref())
        })
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
