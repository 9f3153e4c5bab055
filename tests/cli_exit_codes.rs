use image::RgbaImage;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;
use vrc_lib::VrcOutput;

fn write_image(path: &Path, color: [u8; 4]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create dir");
    }
    let img = RgbaImage::from_pixel(4, 4, image::Rgba(color));
    img.save(path).expect("write image");
}

fn vrc(args: &[&str], envs: &[(&str, &Path)]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vrc"));
    cmd.args(args).env_remove("VRC_MOCK_RENDERERS_DIR");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd.output().expect("run vrc")
}

fn parse(stdout: &[u8]) -> VrcOutput {
    serde_json::from_slice(stdout).expect("stdout should be a JSON payload")
}

#[test]
fn diff_exits_zero_for_matching_images() {
    let dir = TempDir::new().expect("tempdir");
    let captured = dir.path().join("captured.png");
    let reference = dir.path().join("reference.png");
    write_image(&captured, [10, 20, 30, 255]);
    write_image(&reference, [10, 20, 30, 255]);

    let output = vrc(
        &[
            "diff",
            "--captured",
            captured.to_str().unwrap(),
            "--reference",
            reference.to_str().unwrap(),
        ],
        &[],
    );
    assert_eq!(output.status.code(), Some(0));
    match parse(&output.stdout) {
        VrcOutput::Diff(diff) => {
            assert!(diff.passed);
            assert_eq!(diff.match_percentage, 100.0);
            assert_eq!(diff.total_pixels, 16);
        }
        other => panic!("expected diff output, got {other:?}"),
    }
}

#[test]
fn diff_exits_one_and_writes_diff_image_when_images_differ() {
    let dir = TempDir::new().expect("tempdir");
    let captured = dir.path().join("captured.png");
    let reference = dir.path().join("reference.png");
    let diff_path = dir.path().join("out/diff.png");
    write_image(&captured, [0, 0, 0, 255]);
    write_image(&reference, [255, 255, 255, 255]);

    let output = vrc(
        &[
            "diff",
            "--captured",
            captured.to_str().unwrap(),
            "--reference",
            reference.to_str().unwrap(),
            "--diff-output",
            diff_path.to_str().unwrap(),
        ],
        &[],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(diff_path.is_file());
    match parse(&output.stdout) {
        VrcOutput::Diff(diff) => {
            assert!(!diff.passed);
            assert_eq!(diff.mismatched_pixels, 16);
            assert_eq!(diff.match_percentage, 0.0);
        }
        other => panic!("expected diff output, got {other:?}"),
    }
}

#[test]
fn diff_missing_input_is_an_error_payload_with_exit_one() {
    let output = vrc(
        &[
            "diff",
            "--captured",
            "missing.png",
            "--reference",
            "also-missing.png",
        ],
        &[],
    );
    assert_eq!(output.status.code(), Some(1));
    match parse(&output.stdout) {
        VrcOutput::Error(err) => {
            assert!(err.error.message.contains("missing.png"));
            assert!(err.error.remediation.is_some());
        }
        other => panic!("expected error output, got {other:?}"),
    }
}

#[test]
fn run_without_config_reports_config_error() {
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("nope.toml");
    let output = vrc(&["run", "--config", config.to_str().unwrap()], &[]);
    assert_eq!(output.status.code(), Some(1));
    match parse(&output.stdout) {
        VrcOutput::Error(err) => assert!(err.error.message.contains("Config file not found")),
        other => panic!("expected error output, got {other:?}"),
    }
}

fn write_site(root: &Path) -> std::path::PathBuf {
    let config = root.join("vrc.toml");
    std::fs::write(
        &config,
        r#"
base_url = "http://localhost:9"
output_dir = "out"

[[viewports]]
name = "desktop"
width = 1440
height = 900

[[pages]]
id = "home"
path = "/"
[pages.reference_images]
desktop = "mockups/home-desktop.png"

[[pages]]
id = "about"
path = "/about"
[pages.reference_images]
desktop = "mockups/about-desktop.png"
"#,
    )
    .expect("write config");
    write_image(&root.join("renders/home-desktop.png"), [200, 200, 200, 255]);
    write_image(&root.join("renders/about-desktop.png"), [200, 200, 200, 255]);
    write_image(&root.join("mockups/home-desktop.png"), [200, 200, 200, 255]);
    write_image(&root.join("mockups/about-desktop.png"), [0, 0, 0, 255]);
    config
}

#[test]
fn run_with_fixture_renders_exits_one_and_writes_reports() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_site(dir.path());
    let renders = dir.path().join("renders");

    let output = vrc(
        &["run", "--config", config.to_str().unwrap()],
        &[("VRC_MOCK_RENDERERS_DIR", renders.as_path())],
    );
    assert_eq!(output.status.code(), Some(1));
    match parse(&output.stdout) {
        VrcOutput::Run(run) => {
            assert_eq!(run.report.total_comparisons, 2);
            assert_eq!(run.report.passed, 1);
            assert_eq!(run.report.failed, 1);
            assert_eq!(run.report.results[0].page, "about");
            assert!(run.artifacts.json_report.is_file());
            assert!(run.artifacts.html_report.is_file());
            assert!(run.artifacts.json_report.starts_with(dir.path().join("out")));
        }
        other => panic!("expected run output, got {other:?}"),
    }
}

#[test]
fn run_single_passing_cell_exits_zero() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_site(dir.path());
    let renders = dir.path().join("renders");

    let output = vrc(
        &[
            "run",
            "--config",
            config.to_str().unwrap(),
            "--page",
            "home",
            "--viewport",
            "desktop",
        ],
        &[("VRC_MOCK_RENDERERS_DIR", renders.as_path())],
    );
    assert_eq!(output.status.code(), Some(0));
    match parse(&output.stdout) {
        VrcOutput::Run(run) => {
            assert_eq!(run.report.total_comparisons, 1);
            assert_eq!(run.report.average_match, 100.0);
        }
        other => panic!("expected run output, got {other:?}"),
    }
}

#[test]
fn run_unknown_page_is_a_config_error() {
    let dir = TempDir::new().expect("tempdir");
    let config = write_site(dir.path());
    let renders = dir.path().join("renders");

    let output = vrc(
        &[
            "run",
            "--config",
            config.to_str().unwrap(),
            "--page",
            "blog",
            "--viewport",
            "desktop",
        ],
        &[("VRC_MOCK_RENDERERS_DIR", renders.as_path())],
    );
    assert_eq!(output.status.code(), Some(1));
    match parse(&output.stdout) {
        VrcOutput::Error(err) => assert!(err.error.message.contains("Unknown page 'blog'")),
        other => panic!("expected error output, got {other:?}"),
    }
}
