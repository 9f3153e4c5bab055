use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use vrc_lib::output::{EntryStatus, VRC_OUTPUT_VERSION};
use vrc_lib::{ErrorOutput, VrcError, VrcOutput};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &VrcOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the failing exit code.
pub fn render_error(err: VrcError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    tracing::debug!(error = ?err, "command failed");
    let error_payload = err.to_payload();
    let payload = VrcOutput::Error(ErrorOutput {
        version: VRC_OUTPUT_VERSION.to_string(),
        message: Some(error_payload.message.clone()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    ExitCode::from(1)
}

fn write_json_output(body: &VrcOutput, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

fn write_pretty_output(body: &VrcOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &VrcOutput, colorize: bool) -> String {
    let format_pct = |pct: f64, threshold: f64| {
        let code = if pct >= threshold {
            "32"
        } else if threshold - pct <= 5.0 {
            "33"
        } else {
            "31"
        };
        color(&format!("{pct:.2}%"), code, colorize)
    };

    match body {
        VrcOutput::Run(out) => {
            let report = &out.report;
            let mut buf = String::new();
            let ok = report.failed == 0;
            let status = color(if ok { "PASS" } else { "FAIL" }, if ok { "32" } else { "31" }, colorize);
            writeln!(buf, "{status} Visual regression run").ok();
            writeln!(
                buf,
                "{} comparisons: {} passed, {} failed; average match {} (threshold {:.2}%)",
                report.total_comparisons,
                report.passed,
                report.failed,
                format_pct(report.average_match, report.pass_threshold),
                report.pass_threshold
            )
            .ok();

            if !report.results.is_empty() {
                writeln!(buf, "Results:").ok();
            }
            for entry in &report.results {
                let (label, code) = match entry.status {
                    EntryStatus::Passed => ("pass", "32"),
                    EntryStatus::Failed => ("fail", "31"),
                    EntryStatus::CaptureFailed => ("capture-failed", "33"),
                    EntryStatus::ComparisonFailed => ("compare-failed", "33"),
                };
                let cell = format!("{}@{}", entry.page, entry.viewport);
                let detail = match (entry.match_percentage, &entry.failure_reason) {
                    (Some(pct), _) => format_pct(pct, report.pass_threshold),
                    (None, Some(reason)) => reason.clone(),
                    (None, None) => String::new(),
                };
                writeln!(buf, "- {:24} {:16} {}", cell, color(label, code, colorize), detail).ok();
                for warning in &entry.stabilization_warnings {
                    writeln!(buf, "    warning: {warning}").ok();
                }
                for finding in &entry.findings {
                    writeln!(buf, "    [{:?}] {}: {}", finding.severity, finding.rule_id, finding.message).ok();
                }
            }

            writeln!(buf, "Reports:").ok();
            writeln!(buf, "- {:6} {}", "json", out.artifacts.json_report.display()).ok();
            writeln!(buf, "- {:6} {}", "html", out.artifacts.html_report.display()).ok();
            buf
        }
        VrcOutput::Diff(out) => {
            let mut buf = String::new();
            let status = color(
                if out.passed { "PASS" } else { "FAIL" },
                if out.passed { "32" } else { "31" },
                colorize,
            );
            writeln!(buf, "{status} Image diff").ok();
            writeln!(
                buf,
                "Match: {} (threshold {:.2}%)",
                format_pct(out.match_percentage, out.pass_threshold),
                out.pass_threshold
            )
            .ok();
            writeln!(
                buf,
                "Pixels: {} mismatched, {} anti-aliased, {} total ({}x{})",
                out.mismatched_pixels, out.anti_aliased_pixels, out.total_pixels, out.width, out.height
            )
            .ok();
            if let Some(path) = &out.diff_image_path {
                writeln!(buf, "Diff image: {}", path.display()).ok();
            }
            buf
        }
        VrcOutput::Error(out) => {
            let mut buf = String::new();
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
            buf
        }
    }
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

/// Exit code for a finished run or diff: 0 only when nothing failed.
pub fn exit_code_for(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
