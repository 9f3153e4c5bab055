use std::path::PathBuf;
use std::process::ExitCode;

use vrc_lib::image_loader::{decode_rgba, encode_png, read_image_bytes, write_bytes, ImageLoadError};
use vrc_lib::output::{DiffOutput, VRC_OUTPUT_VERSION};
use vrc_lib::{compare_images, ComparisonOptions, VrcError, VrcOutput};

use crate::cli::OutputFormat;
use crate::formatting::{exit_code_for, render_error, write_output};

pub struct DiffArgs {
    pub captured: PathBuf,
    pub reference: PathBuf,
    pub threshold: f64,
    pub include_aa: bool,
    pub pass_threshold: f64,
    pub diff_output: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
}

/// Compare two local images with the run engine.
pub fn run_diff(args: DiffArgs) -> ExitCode {
    let format = args.format;
    let output = args.output.clone();
    match diff(args) {
        Ok(body) => {
            let passed = matches!(&body, VrcOutput::Diff(d) if d.passed);
            if let Err(err) = write_output(&body, format, output.clone()) {
                return render_error(VrcError::Unknown(err.to_string()), format, output);
            }
            exit_code_for(passed)
        }
        Err(err) => render_error(err, format, output),
    }
}

fn diff(args: DiffArgs) -> Result<VrcOutput, VrcError> {
    if !(0.0..=1.0).contains(&args.threshold) {
        return Err(VrcError::config(format!(
            "--threshold must be within 0..=1 (got {})",
            args.threshold
        )));
    }
    if !(0.0..=100.0).contains(&args.pass_threshold) {
        return Err(VrcError::config(format!(
            "--pass-threshold must be within 0..=100 (got {})",
            args.pass_threshold
        )));
    }

    let captured = load(&args.captured, "Captured image")?;
    let reference = load(&args.reference, "Reference image")?;
    let options = ComparisonOptions {
        threshold: args.threshold,
        include_anti_aliasing: args.include_aa,
        pass_threshold: args.pass_threshold,
    };
    let comparison = compare_images(&captured, &reference, &options);

    if let Some(path) = &args.diff_output {
        let bytes = encode_png(&comparison.diff_image)?;
        write_bytes(path, &bytes)?;
    }

    Ok(VrcOutput::Diff(DiffOutput {
        version: VRC_OUTPUT_VERSION.to_string(),
        captured: args.captured,
        reference: args.reference,
        width: comparison.width,
        height: comparison.height,
        total_pixels: comparison.total_pixels,
        mismatched_pixels: comparison.mismatched_pixels,
        anti_aliased_pixels: comparison.anti_aliased_pixels,
        match_percentage: comparison.match_percentage,
        pass_threshold: args.pass_threshold,
        passed: comparison.passed,
        diff_image_path: args.diff_output,
    }))
}

fn load(path: &std::path::Path, label: &str) -> Result<image::RgbaImage, VrcError> {
    let bytes = read_image_bytes(path).map_err(|err| match err {
        ImageLoadError::NotFound(path) => {
            VrcError::config(format!("{label} {} does not exist", path.display()))
        }
        other => other.into(),
    })?;
    Ok(decode_rgba(&bytes)?)
}
