//! `save_image`: the single entry point for persisting a processed image.
//!
//! Never returns an error; every failure becomes a `SaveResult` with
//! `success == false` plus its classification.

use image::{DynamicImage, RgbImage};
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::types::SourceImage;

use super::atomic::save_with_atomic_replace;
use super::classify::{classify, ErrorCategory};
use super::encoder::{build_encoder_settings, encode_image};
use super::exif::{build_exif_for_format, embed_exif, ExifBuildMeta};
use super::format::destination_with_extension;
use super::naming::normalize_windows_output_filename;
use super::options::{SaveOptions, SaveResult};
use super::retry::{retry, RetryPolicy};

/// Error text fragments that indicate a transient lock.
const TRANSIENT_ERROR_PHRASES: [&str; 6] = [
    "resource temporarily unavailable",
    "temporarily unavailable",
    "used by another process",
    "in use",
    "timed out",
    "timeout",
];

struct ResultBuilder<'a> {
    output_path: PathBuf,
    options: &'a SaveOptions,
    meta: ExifBuildMeta,
    name_notice: Option<String>,
}

impl ResultBuilder<'_> {
    fn base(&self, success: bool) -> SaveResult {
        SaveResult {
            success,
            output_path: self.output_path.clone(),
            exif_mode: self.options.exif_mode,
            dry_run: false,
            had_source_exif: self.meta.had_source_exif,
            exif_requested: self.meta.exif_requested,
            exif_attached: false,
            exif_fallback_without_metadata: false,
            exif_skipped_reason: self.meta.skipped_reason.clone(),
            gps_removed: self.meta.gps_removed,
            edited_fields: self.meta.edited_fields.clone(),
            skipped_reason: None,
            error: None,
            error_code: None,
            error_category: None,
            retryable: false,
            error_guidance: None,
            name_notice: self.name_notice.clone(),
        }
    }

    fn failed(&self, error: &PipelineError) -> SaveResult {
        let classification = classify(error);
        tracing::error!(
            "Save failed for {:?} ({}): {}",
            self.output_path,
            classification.category,
            error
        );
        SaveResult {
            error: Some(error.to_string()),
            error_code: classification.code,
            error_category: Some(classification.category),
            retryable: classification.retryable,
            error_guidance: Some(classification.guidance),
            ..self.base(false)
        }
    }
}

/// Composite onto an opaque white background.
fn flatten_onto_white(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in rgb.pixels_mut().zip(rgba.pixels()) {
        let alpha = u32::from(src[3]);
        for c in 0..3 {
            let blended = (u32::from(src[c]) * alpha + 255 * (255 - alpha) + 127) / 255;
            dst[c] = blended as u8;
        }
    }
    DynamicImage::ImageRgb8(rgb)
}

/// Encode and write `resized` to `output_path` (extension corrected for
/// the format), attaching EXIF according to `options`.
///
/// When the write with EXIF fails, one more write without EXIF is made; a
/// success there is reported with `exif_fallback_without_metadata`.
pub fn save_image(
    source: &SourceImage,
    resized: &DynamicImage,
    output_path: &Path,
    options: &SaveOptions,
) -> SaveResult {
    let (final_path, name_notice) = normalize_windows_output_filename(
        &destination_with_extension(output_path, options.output_format),
    );
    let (exif_bytes, meta) = build_exif_for_format(
        source.exif.as_ref(),
        options.exif_mode,
        options.remove_gps,
        options.exif_edit(),
        options.output_format,
    );

    if options.verbose {
        tracing::debug!(
            "save_image: format={} quality={} dry_run={} exif_mode={} has_exif={} gps_removed={} edits={:?}",
            options.output_format,
            options.quality,
            options.dry_run,
            options.exif_mode,
            meta.had_source_exif,
            meta.gps_removed,
            meta.edited_fields
        );
    }

    let exif_attached_plan = exif_bytes.is_some();
    let results = ResultBuilder {
        output_path: final_path.clone(),
        options,
        meta,
        name_notice,
    };

    if options.dry_run {
        return SaveResult {
            dry_run: true,
            exif_attached: exif_attached_plan,
            skipped_reason: Some("dry-run".to_string()),
            ..results.base(true)
        };
    }

    let settings = build_encoder_settings(
        options.output_format,
        options.quality,
        options.webp_method,
        options.webp_lossless,
        options.avif_speed,
        false,
    );

    let flattened;
    let to_encode = if !options.output_format.supports_alpha() && resized.color().has_alpha() {
        flattened = flatten_onto_white(resized);
        &flattened
    } else {
        resized
    };

    let encoded = match encode_image(to_encode, &settings) {
        Ok(bytes) => bytes,
        Err(e) => return results.failed(&e),
    };

    let Some(block) = exif_bytes else {
        return match save_with_atomic_replace(&final_path, &encoded) {
            Ok(()) => results.base(true),
            Err(e) => results.failed(&e),
        };
    };

    let with_exif = embed_exif(encoded.clone(), options.output_format, &block)
        .and_then(|bytes| save_with_atomic_replace(&final_path, &bytes));
    let exif_error = match with_exif {
        Ok(()) => {
            return SaveResult {
                exif_attached: true,
                ..results.base(true)
            }
        }
        Err(e) => e,
    };

    tracing::warn!(
        "Saving {:?} with EXIF failed ({}), retrying without metadata",
        final_path,
        exif_error
    );
    match save_with_atomic_replace(&final_path, &encoded) {
        Ok(()) => SaveResult {
            exif_fallback_without_metadata: true,
            exif_skipped_reason: Some(format!("exif-write-failed: {}", exif_error)),
            ..results.base(true)
        },
        Err(e) => results.failed(&e),
    }
}

/// Whether a failed result is worth another attempt.
pub fn is_retryable_save_result(result: &SaveResult) -> bool {
    if result.success {
        return false;
    }
    if result.retryable || result.error_category == Some(ErrorCategory::SharingViolation) {
        return true;
    }
    if matches!(result.error_code, Some(32 | 33)) {
        return true;
    }
    let Some(error) = result.error.as_deref() else {
        return false;
    };
    let text = error.to_lowercase();
    TRANSIENT_ERROR_PHRASES.iter().any(|p| text.contains(p))
}

/// `save_image` with retries for transient failures.
///
/// Retries only when `allow_retry` is set; returns the final result and
/// the number of attempts made.
pub fn save_with_retry(
    source: &SourceImage,
    resized: &DynamicImage,
    output_path: &Path,
    options: &SaveOptions,
    allow_retry: bool,
    policy: &RetryPolicy,
) -> (SaveResult, u32) {
    let policy = if allow_retry {
        *policy
    } else {
        RetryPolicy::once()
    };
    retry(
        &policy,
        |_| save_image(source, resized, output_path, options),
        is_retryable_save_result,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::exif::tests::sample_exif;
    use crate::save::format::OutputFormat;
    use crate::save::options::{ExifEditValues, ExifMode};
    use std::time::Duration;

    fn source(with_exif: bool) -> SourceImage {
        SourceImage {
            image: DynamicImage::new_rgb8(32, 24),
            format: Some(image::ImageFormat::Jpeg),
            exif: with_exif.then(|| sample_exif(true)),
        }
    }

    #[test]
    fn test_save_jpeg_with_exif() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(true);
        let options = SaveOptions::new(OutputFormat::Jpeg);

        let result = save_image(&src, &src.image, &dir.path().join("out.png"), &options);

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output_path, dir.path().join("out.jpg"));
        assert!(result.exif_attached);
        assert!(result.had_source_exif);
        assert!(result.output_path.exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(true);
        let options = SaveOptions::new(OutputFormat::Png).with_dry_run(true);

        let result = save_image(&src, &src.image, &dir.path().join("out"), &options);

        assert!(result.success);
        assert!(result.dry_run);
        assert_eq!(result.skipped_reason.as_deref(), Some("dry-run"));
        assert!(!result.output_path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_remove_mode_never_attaches() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(true);
        let options = SaveOptions::new(OutputFormat::Jpeg).with_exif_mode(ExifMode::Remove);
        let result = save_image(&src, &src.image, &dir.path().join("out"), &options);
        assert!(result.success);
        assert!(!result.exif_attached);
        assert!(!result.exif_requested);
    }

    #[cfg(feature = "avif")]
    #[test]
    fn test_avif_dry_run_matches_real_save() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(true);
        let options = SaveOptions::new(OutputFormat::Avif).with_exif_edit(ExifEditValues {
            artist: Some("Alice".into()),
            ..Default::default()
        });

        let dry_options = options.clone().with_dry_run(true);
        let planned = save_image(&src, &src.image, &dir.path().join("out"), &dry_options);
        let real = save_image(&src, &src.image, &dir.path().join("out"), &options);

        assert!(real.success, "{:?}", real.error);
        assert_eq!(planned.exif_attached, real.exif_attached);
        assert!(!real.exif_attached);
        assert!(!real.exif_fallback_without_metadata);
        assert_eq!(planned.exif_skipped_reason, real.exif_skipped_reason);
        assert_eq!(real.exif_skipped_reason.as_deref(), Some("exif-unsupported-format"));
        assert_eq!(planned.output_path, real.output_path);
    }

    #[test]
    fn test_avif_dry_run_plans_no_exif() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(true);
        let options = SaveOptions::new(OutputFormat::Avif).with_dry_run(true);

        let result = save_image(&src, &src.image, &dir.path().join("out"), &options);

        assert!(result.success);
        assert!(result.exif_requested);
        assert!(!result.exif_attached);
        assert_eq!(result.exif_skipped_reason.as_deref(), Some("exif-unsupported-format"));
        assert_eq!(result.output_path, dir.path().join("out.avif"));
    }

    #[test]
    fn test_dotted_stem_keeps_full_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(false);
        let options = SaveOptions::new(OutputFormat::Png);

        let result = save_image(&src, &src.image, &dir.path().join("photo.2024_resized"), &options);

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output_path, dir.path().join("photo.2024_resized.png"));
        assert!(result.output_path.exists());
        assert!(result.name_notice.is_none());
    }

    #[cfg(windows)]
    #[test]
    fn test_reserved_name_adjusted_with_notice() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(false);
        let options = SaveOptions::new(OutputFormat::Png);

        let result = save_image(&src, &src.image, &dir.path().join("CON"), &options);

        assert!(result.success, "{:?}", result.error);
        assert_ne!(result.output_path, dir.path().join("CON.png"));
        assert!(result.name_notice.is_some());
    }

    #[test]
    fn test_missing_directory_is_classified() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(false);
        let options = SaveOptions::new(OutputFormat::Png);
        let target = dir.path().join("missing").join("out");

        let result = save_image(&src, &src.image, &target, &options);

        assert!(!result.success);
        assert!(result.error.is_some());
        assert!(result.error_category.is_some());
        assert!(result.error_guidance.is_some());
        assert!(!result.retryable);
    }

    #[test]
    fn test_alpha_flattened_for_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(false);
        let transparent = DynamicImage::new_rgba8(4, 4);
        let options = SaveOptions::new(OutputFormat::Jpeg).with_quality(100);

        let result = save_image(&src, &transparent, &dir.path().join("t"), &options);
        assert!(result.success);

        let decoded = image::open(&result.output_path).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(1, 1);
        assert!(pixel[0] > 240 && pixel[1] > 240 && pixel[2] > 240);
    }

    fn failed_result(error: &str, category: Option<ErrorCategory>) -> SaveResult {
        let builder_options = SaveOptions::new(OutputFormat::Jpeg);
        let results = ResultBuilder {
            output_path: PathBuf::from("x.jpg"),
            options: &builder_options,
            meta: ExifBuildMeta::default(),
            name_notice: None,
        };
        SaveResult {
            error: Some(error.to_string()),
            error_category: category,
            ..results.base(false)
        }
    }

    #[test]
    fn test_retryable_judgement() {
        assert!(is_retryable_save_result(&failed_result(
            "x",
            Some(ErrorCategory::SharingViolation)
        )));
        assert!(is_retryable_save_result(&failed_result(
            "The process cannot access the file because it is being used by another process",
            Some(ErrorCategory::WindowsOsError)
        )));
        assert!(is_retryable_save_result(&failed_result("Operation timed out", None)));
        assert!(!is_retryable_save_result(&failed_result(
            "Permission denied",
            Some(ErrorCategory::PermissionDenied)
        )));

        let mut with_code = failed_result("x", None);
        with_code.error_code = Some(33);
        assert!(is_retryable_save_result(&with_code));
    }

    #[test]
    fn test_save_with_retry_respects_allow_retry() {
        let dir = tempfile::tempdir().unwrap();
        let src = source(false);
        let options = SaveOptions::new(OutputFormat::Png);
        let target = dir.path().join("missing").join("out");
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        };

        let (result, attempts) = save_with_retry(&src, &src.image, &target, &options, false, &policy);
        assert!(!result.success);
        assert_eq!(attempts, 1);

        // A missing directory is not transient either
        let (_, attempts) = save_with_retry(&src, &src.image, &target, &options, true, &policy);
        assert_eq!(attempts, 1);
    }
}
