use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ErrorPayload, FailureCategory};
use crate::types::{
    ComparisonStatus, ConsoleMessage, LayoutFinding, RunReport, TaskOutcome,
};

/// Schema version for output payloads and persisted reports.
pub const VRC_OUTPUT_VERSION: &str = "1.0.0";

/// Everything the CLI prints on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum VrcOutput {
    Run(RunOutput),
    Diff(DiffOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    #[serde(flatten)]
    pub report: ReportDocument,
    pub artifacts: ReportArtifacts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportArtifacts {
    pub json_report: PathBuf,
    pub html_report: PathBuf,
}

/// The persisted `comparison-report-{timestamp}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub pass_threshold: f64,
    pub total_comparisons: usize,
    pub passed: usize,
    pub failed: usize,
    pub average_match: f64,
    pub results: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryStatus {
    Passed,
    Failed,
    CaptureFailed,
    ComparisonFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub page: String,
    pub viewport: String,
    pub width: u32,
    pub height: u32,
    pub mockup_path: Option<PathBuf>,
    pub url: String,
    pub status: EntryStatus,
    pub passed: bool,
    /// `null` unless the task reached a completed comparison.
    pub match_percentage: Option<f64>,
    pub mismatched_pixels: Option<u64>,
    pub total_pixels: Option<u64>,
    pub diff_image_path: Option<PathBuf>,
    pub screenshot_path: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_category: Option<FailureCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub console_messages: Vec<ConsoleMessage>,
    #[serde(default)]
    pub page_errors: Vec<String>,
    #[serde(default)]
    pub stabilization_warnings: Vec<String>,
    #[serde(default)]
    pub findings: Vec<LayoutFinding>,
}

impl ReportEntry {
    pub fn from_outcome(outcome: &TaskOutcome) -> Self {
        let task = outcome.task();
        let capture = outcome.capture();
        let comparison = outcome.comparison();
        let completed = comparison.filter(|c| c.status == ComparisonStatus::Compared);

        let status = match outcome {
            TaskOutcome::CaptureFailed(_) => EntryStatus::CaptureFailed,
            TaskOutcome::Compared { comparison, .. } => match comparison.status {
                ComparisonStatus::ComparisonFailed => EntryStatus::ComparisonFailed,
                ComparisonStatus::Compared if comparison.passed => EntryStatus::Passed,
                ComparisonStatus::Compared => EntryStatus::Failed,
            },
        };
        let failure = outcome.failure();

        Self {
            page: task.page_id.clone(),
            viewport: task.viewport.name.clone(),
            width: task.viewport.width,
            height: task.viewport.height,
            mockup_path: task.reference_image.clone(),
            url: task.url.clone(),
            status,
            passed: outcome.passed(),
            match_percentage: completed.map(|c| c.match_percentage),
            mismatched_pixels: completed.map(|c| c.mismatched_pixels),
            total_pixels: completed.map(|c| c.total_pixels),
            diff_image_path: comparison.and_then(|c| c.diff_image_path.clone()),
            screenshot_path: capture.screenshot_path.clone(),
            timestamp: comparison.map(|c| c.compared_at).unwrap_or(capture.captured_at),
            failure_category: failure.map(|f| f.category),
            failure_reason: failure.map(|f| f.reason.clone()),
            console_messages: capture.console_messages.clone(),
            page_errors: capture.page_errors.clone(),
            stabilization_warnings: capture.stabilization_warnings.clone(),
            findings: capture.findings.clone(),
        }
    }
}

impl ReportDocument {
    pub fn from_report(report: &RunReport) -> Self {
        Self {
            version: VRC_OUTPUT_VERSION.to_string(),
            timestamp: report.timestamp,
            pass_threshold: report.pass_threshold,
            total_comparisons: report.summary.total_comparisons,
            passed: report.summary.passed,
            failed: report.summary.failed,
            average_match: report.summary.average_match_percentage,
            results: report.results.iter().map(ReportEntry::from_outcome).collect(),
        }
    }
}

/// Result of `vrc diff` on two local images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffOutput {
    pub version: String,
    pub captured: PathBuf,
    pub reference: PathBuf,
    pub width: u32,
    pub height: u32,
    pub total_pixels: u64,
    pub mismatched_pixels: u64,
    pub anti_aliased_pixels: u64,
    pub match_percentage: f64,
    pub pass_threshold: f64,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_image_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}
