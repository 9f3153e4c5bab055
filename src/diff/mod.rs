//! Image comparison engine.
//!
//! Captured and reference images are reconciled onto a shared canvas
//! ([`canvas::reconcile`]), compared pixel by pixel ([`pixelmatch::pixelmatch`]),
//! and summarised as a match percentage plus a diff image.

pub mod canvas;
pub mod pixelmatch;

use std::path::PathBuf;

use chrono::Utc;
use image::RgbaImage;
use tracing::debug;

use crate::config::{RunConfig, DEFAULT_PASS_THRESHOLD, DEFAULT_PIXEL_THRESHOLD};
use crate::error::{Failure, FailureCategory, VrcError};
use crate::image_loader::{decode_rgba, encode_png, read_image_bytes, write_bytes, ImageLoadError};
use crate::types::{CaptureResult, ComparisonResult, ComparisonStatus, RunStamp, TaskState};

pub use canvas::reconcile;
pub use pixelmatch::{PixelmatchOptions, MAX_YIQ_DELTA};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonOptions {
    /// Per-pixel colour tolerance in `0..=1`.
    pub threshold: f64,
    pub include_anti_aliasing: bool,
    /// Minimum match percentage for a pass.
    pub pass_threshold: f64,
}

impl Default for ComparisonOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PIXEL_THRESHOLD,
            include_anti_aliasing: false,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

impl ComparisonOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            threshold: config.comparison.threshold,
            include_anti_aliasing: config.comparison.include_anti_aliasing,
            pass_threshold: config.pass_threshold,
        }
    }

    fn pixelmatch(&self) -> PixelmatchOptions {
        PixelmatchOptions {
            threshold: self.threshold.clamp(0.0, 1.0),
            include_anti_aliasing: self.include_anti_aliasing,
        }
    }
}

/// Outcome of comparing two decoded images.
#[derive(Debug, Clone)]
pub struct ImageComparison {
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    pub mismatched_pixels: u64,
    pub anti_aliased_pixels: u64,
    pub match_percentage: f64,
    pub passed: bool,
    pub diff_image: RgbaImage,
}

/// Compares two images of any size; smaller ones are padded, never scaled.
pub fn compare_images(
    captured: &RgbaImage,
    reference: &RgbaImage,
    options: &ComparisonOptions,
) -> ImageComparison {
    let (captured, reference) = reconcile(captured, reference);
    let (width, height) = captured.dimensions();
    let total_pixels = width as u64 * height as u64;

    let out = pixelmatch::pixelmatch(&captured, &reference, options.pixelmatch());
    let match_percentage = match_percentage(total_pixels, out.mismatched);

    ImageComparison {
        width,
        height,
        total_pixels,
        mismatched_pixels: out.mismatched,
        anti_aliased_pixels: out.anti_aliased,
        match_percentage,
        passed: passes(match_percentage, options.pass_threshold),
        diff_image: out.diff,
    }
}

/// Decodes both buffers then runs [`compare_images`].
pub fn compare_bytes(
    captured: &[u8],
    reference: &[u8],
    options: &ComparisonOptions,
) -> Result<ImageComparison, ImageLoadError> {
    let captured = decode_rgba(captured)?;
    let reference = decode_rgba(reference)?;
    Ok(compare_images(&captured, &reference, options))
}

/// `100 × matching / total`, rounded to two decimals. An empty canvas matches fully.
pub fn match_percentage(total_pixels: u64, mismatched_pixels: u64) -> f64 {
    if total_pixels == 0 {
        return 100.0;
    }
    let matching = total_pixels.saturating_sub(mismatched_pixels);
    round_percentage(100.0 * matching as f64 / total_pixels as f64)
}

pub fn round_percentage(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn passes(match_percentage: f64, pass_threshold: f64) -> bool {
    match_percentage >= pass_threshold
}

/// Compares finished captures against their references and writes diff images.
#[derive(Debug, Clone)]
pub struct Comparator {
    options: ComparisonOptions,
    diff_dir: PathBuf,
    stamp: RunStamp,
}

impl Comparator {
    pub fn new(options: ComparisonOptions, diff_dir: impl Into<PathBuf>, stamp: RunStamp) -> Self {
        Self {
            options,
            diff_dir: diff_dir.into(),
            stamp,
        }
    }

    /// Never fails: problems become a `ComparisonFailed` result.
    pub fn compare(&self, capture: &CaptureResult) -> ComparisonResult {
        debug!(task = %capture.task, state = %TaskState::Comparing, "comparing");
        match self.try_compare(capture) {
            Ok(result) => result,
            Err(failure) => {
                debug!(task = %capture.task, category = %failure.category, "comparison failed");
                ComparisonResult::failed(
                    capture.task.clone(),
                    capture.screenshot_path.clone(),
                    failure,
                )
            }
        }
    }

    fn try_compare(&self, capture: &CaptureResult) -> Result<ComparisonResult, Failure> {
        let task = &capture.task;
        let reference_path = task.reference_image.as_ref().ok_or_else(|| {
            Failure::new(
                FailureCategory::ReferenceMissing,
                format!(
                    "No reference image configured for page '{}' at viewport '{}'",
                    task.page_id, task.viewport.name
                ),
            )
        })?;
        let reference_bytes =
            read_image_bytes(reference_path).map_err(|err| match VrcError::from(err) {
                missing @ VrcError::ReferenceMissing(_) => missing.to_failure(),
                other => Failure::new(
                    FailureCategory::ReferenceMissing,
                    format!("Reference image unavailable: {other}"),
                ),
            })?;

        let screenshot_path = capture.screenshot_path.as_ref().ok_or_else(|| {
            Failure::new(
                FailureCategory::ScreenshotError,
                "Capture finished without a screenshot",
            )
        })?;
        let captured_bytes = read_image_bytes(screenshot_path).map_err(|err| {
            Failure::new(
                FailureCategory::ScreenshotError,
                format!("Screenshot unavailable: {err}"),
            )
        })?;

        let captured = decode_rgba(&captured_bytes).map_err(|err| {
            Failure::new(
                FailureCategory::ImageDecodeError,
                format!("Screenshot {}: {err}", screenshot_path.display()),
            )
        })?;
        let reference = decode_rgba(&reference_bytes).map_err(|err| {
            Failure::new(
                FailureCategory::ImageDecodeError,
                format!("Reference {}: {err}", reference_path.display()),
            )
        })?;

        let comparison = compare_images(&captured, &reference, &self.options);

        let diff_path = self
            .diff_dir
            .join(format!("{}-diff-{}.png", task.file_stem(), self.stamp));
        let encoded = encode_png(&comparison.diff_image).map_err(|err| {
            Failure::new(FailureCategory::DiffWriteError, format!("Encoding diff: {err}"))
        })?;
        write_bytes(&diff_path, &encoded).map_err(|err| {
            Failure::new(
                FailureCategory::DiffWriteError,
                format!("Writing {}: {err}", diff_path.display()),
            )
        })?;

        Ok(ComparisonResult {
            task: task.clone(),
            screenshot_path: Some(screenshot_path.clone()),
            match_percentage: comparison.match_percentage,
            mismatched_pixels: comparison.mismatched_pixels,
            anti_aliased_pixels: comparison.anti_aliased_pixels,
            total_pixels: comparison.total_pixels,
            width: comparison.width,
            height: comparison.height,
            diff_image_path: Some(diff_path),
            passed: comparison.passed,
            status: ComparisonStatus::Compared,
            failure: None,
            compared_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CaptureTask, NamedViewport, PageLog};
    use image::Rgba;
    use proptest::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    const GREEN: Rgba<u8> = Rgba([0, 128, 0, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn write_png(path: &Path, img: &RgbaImage) {
        write_bytes(path, &encode_png(img).unwrap()).unwrap();
    }

    fn task(reference: Option<PathBuf>) -> CaptureTask {
        CaptureTask {
            page_id: "home".into(),
            url: "http://localhost:8080/".into(),
            viewport: NamedViewport::new("mobile", 2, 2),
            reference_image: reference,
        }
    }

    #[test]
    fn identical_images_match_fully() {
        let img = RgbaImage::from_pixel(10, 10, GREEN);
        let result = compare_images(&img, &img, &ComparisonOptions::default());
        assert_eq!(result.mismatched_pixels, 0);
        assert_eq!(result.match_percentage, 100.0);
        assert!(result.passed);
    }

    #[test]
    fn one_red_pixel_in_four_is_seventy_five_percent() {
        let reference = RgbaImage::from_pixel(2, 2, GREEN);
        let mut captured = reference.clone();
        captured.put_pixel(1, 1, RED);

        let result = compare_images(&captured, &reference, &ComparisonOptions::default());
        assert_eq!(result.mismatched_pixels, 1);
        assert_eq!(result.total_pixels, 4);
        assert_eq!(result.match_percentage, 75.0);
        assert!(!result.passed);
        assert_eq!(result.diff_image.get_pixel(1, 1), &RED);
    }

    #[test]
    fn size_mismatch_pads_the_smaller_image() {
        let captured = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        let reference = RgbaImage::from_pixel(20, 10, Rgba([255, 255, 255, 255]));
        let result = compare_images(&captured, &reference, &ComparisonOptions::default());
        assert_eq!((result.width, result.height), (20, 10));
        assert_eq!(result.total_pixels, 200);
        // white padding against a white reference: nothing differs
        assert_eq!(result.mismatched_pixels, 0);

        let black = RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 255]));
        let result = compare_images(&black, &reference, &ComparisonOptions::default());
        assert_eq!(result.mismatched_pixels, 200);
        assert_eq!(result.match_percentage, 0.0);
    }

    #[test]
    fn empty_canvas_counts_as_full_match() {
        assert_eq!(match_percentage(0, 0), 100.0);
        let empty = RgbaImage::new(0, 0);
        let result = compare_images(&empty, &empty, &ComparisonOptions::default());
        assert_eq!(result.match_percentage, 100.0);
    }

    #[test]
    fn percentage_is_rounded_to_two_decimals() {
        assert_eq!(match_percentage(3, 1), 66.67);
        assert_eq!(round_percentage(99.994), 99.99);
        assert!(passes(95.0, 95.0));
        assert!(!passes(94.99, 95.0));
    }

    #[test]
    fn comparison_is_deterministic() {
        let reference = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 90, 255]));
        let mut captured = reference.clone();
        captured.put_pixel(4, 4, RED);
        captured.put_pixel(9, 2, GREEN);

        let options = ComparisonOptions::default();
        let first = compare_images(&captured, &reference, &options);
        let second = compare_images(&captured, &reference, &options);
        assert_eq!(first.mismatched_pixels, second.mismatched_pixels);
        assert_eq!(first.match_percentage, second.match_percentage);
        assert_eq!(first.diff_image.as_raw(), second.diff_image.as_raw());
    }

    #[test]
    fn comparator_writes_diff_image() {
        let dir = TempDir::new().unwrap();
        let reference_path = dir.path().join("ref.png");
        let shot_path = dir.path().join("shot.png");
        let reference = RgbaImage::from_pixel(2, 2, GREEN);
        let mut captured = reference.clone();
        captured.put_pixel(0, 0, RED);
        write_png(&reference_path, &reference);
        write_png(&shot_path, &captured);

        let stamp = RunStamp::now();
        let comparator = Comparator::new(
            ComparisonOptions::default(),
            dir.path().join("diffs"),
            stamp.clone(),
        );
        let capture = CaptureResult::captured(task(Some(reference_path)), shot_path, PageLog::default());
        let result = comparator.compare(&capture);

        assert_eq!(result.status, ComparisonStatus::Compared);
        assert_eq!(result.match_percentage, 75.0);
        let diff_path = result.diff_image_path.expect("diff path");
        assert_eq!(
            diff_path.file_name().and_then(|n| n.to_str()),
            Some(format!("home-mobile-diff-{stamp}.png").as_str())
        );
        assert!(diff_path.exists());
    }

    #[test]
    fn comparator_reports_missing_reference() {
        let dir = TempDir::new().unwrap();
        let shot_path = dir.path().join("shot.png");
        write_png(&shot_path, &RgbaImage::from_pixel(2, 2, GREEN));
        let comparator = Comparator::new(ComparisonOptions::default(), dir.path(), RunStamp::now());

        for reference in [None, Some(dir.path().join("nope.png"))] {
            let capture =
                CaptureResult::captured(task(reference), shot_path.clone(), PageLog::default());
            let result = comparator.compare(&capture);
            assert_eq!(result.status, ComparisonStatus::ComparisonFailed);
            assert!(!result.passed);
            assert_eq!(
                result.failure.as_ref().map(|f| f.category),
                Some(FailureCategory::ReferenceMissing)
            );
        }

        let absent = dir.path().join("nope.png");
        let capture = CaptureResult::captured(task(Some(absent.clone())), shot_path, PageLog::default());
        let failure = comparator.compare(&capture).failure.unwrap();
        assert_eq!(
            failure.reason,
            format!("Reference image missing: {}", absent.display())
        );
    }

    #[test]
    fn comparator_reports_undecodable_reference() {
        let dir = TempDir::new().unwrap();
        let shot_path = dir.path().join("shot.png");
        let reference_path = dir.path().join("ref.png");
        write_png(&shot_path, &RgbaImage::from_pixel(2, 2, GREEN));
        std::fs::write(&reference_path, b"not an image").unwrap();

        let comparator = Comparator::new(ComparisonOptions::default(), dir.path(), RunStamp::now());
        let capture = CaptureResult::captured(task(Some(reference_path)), shot_path, PageLog::default());
        let result = comparator.compare(&capture);
        assert_eq!(
            result.failure.map(|f| f.category),
            Some(FailureCategory::ImageDecodeError)
        );
    }

    fn small_image() -> impl Strategy<Value = RgbaImage> {
        (1u32..6, 1u32..6).prop_flat_map(|(w, h)| {
            proptest::collection::vec(any::<u8>(), (w * h * 4) as usize)
                .prop_map(move |raw| RgbaImage::from_raw(w, h, raw).unwrap())
        })
    }

    proptest! {
        #[test]
        fn match_percentage_stays_in_range(a in small_image(), b in small_image()) {
            let result = compare_images(&a, &b, &ComparisonOptions::default());
            prop_assert!((0.0..=100.0).contains(&result.match_percentage));
            prop_assert!(result.mismatched_pixels <= result.total_pixels);
            prop_assert_eq!(result.total_pixels, result.width as u64 * result.height as u64);
        }

        #[test]
        fn self_comparison_always_matches(a in small_image()) {
            let result = compare_images(&a, &a, &ComparisonOptions::default());
            prop_assert_eq!(result.mismatched_pixels, 0);
            prop_assert_eq!(result.match_percentage, 100.0);
        }
    }
}
