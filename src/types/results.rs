use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::task::CaptureTask;
use crate::error::Failure;

/// A browser console message observed while the task's page was open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    pub level: String,
    pub text: String,
}

/// Everything the page logged between opening and closing its browsing context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLog {
    #[serde(default)]
    pub console_messages: Vec<ConsoleMessage>,
    #[serde(default)]
    pub page_errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    Info,
    Warning,
    Error,
}

/// Output of a layout rule run against a captured page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutFinding {
    pub rule_id: String,
    pub severity: FindingSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureStatus {
    Captured,
    CaptureFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub task: CaptureTask,
    pub screenshot_path: Option<PathBuf>,
    pub captured_at: DateTime<Utc>,
    pub console_messages: Vec<ConsoleMessage>,
    pub page_errors: Vec<String>,
    pub stabilization_warnings: Vec<String>,
    pub findings: Vec<LayoutFinding>,
    pub status: CaptureStatus,
    pub failure: Option<Failure>,
}

impl CaptureResult {
    pub fn captured(task: CaptureTask, screenshot_path: PathBuf, log: PageLog) -> Self {
        Self {
            task,
            screenshot_path: Some(screenshot_path),
            captured_at: Utc::now(),
            console_messages: log.console_messages,
            page_errors: log.page_errors,
            stabilization_warnings: Vec::new(),
            findings: Vec::new(),
            status: CaptureStatus::Captured,
            failure: None,
        }
    }

    pub fn failed(task: CaptureTask, failure: Failure) -> Self {
        Self {
            task,
            screenshot_path: None,
            captured_at: Utc::now(),
            console_messages: Vec::new(),
            page_errors: Vec::new(),
            stabilization_warnings: Vec::new(),
            findings: Vec::new(),
            status: CaptureStatus::CaptureFailed,
            failure: Some(failure),
        }
    }

    pub fn with_log(mut self, log: PageLog) -> Self {
        self.console_messages = log.console_messages;
        self.page_errors = log.page_errors;
        self
    }

    pub fn is_captured(&self) -> bool {
        self.status == CaptureStatus::Captured
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonStatus {
    Compared,
    ComparisonFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub task: CaptureTask,
    pub screenshot_path: Option<PathBuf>,
    /// Always within `0..=100`, rounded to two decimals.
    pub match_percentage: f64,
    pub mismatched_pixels: u64,
    pub anti_aliased_pixels: u64,
    /// Area of the reconciled canvas.
    pub total_pixels: u64,
    pub width: u32,
    pub height: u32,
    pub diff_image_path: Option<PathBuf>,
    pub passed: bool,
    pub status: ComparisonStatus,
    pub failure: Option<Failure>,
    pub compared_at: DateTime<Utc>,
}

impl ComparisonResult {
    pub fn failed(task: CaptureTask, screenshot_path: Option<PathBuf>, failure: Failure) -> Self {
        Self {
            task,
            screenshot_path,
            match_percentage: 0.0,
            mismatched_pixels: 0,
            anti_aliased_pixels: 0,
            total_pixels: 0,
            width: 0,
            height: 0,
            diff_image_path: None,
            passed: false,
            status: ComparisonStatus::ComparisonFailed,
            failure: Some(failure),
            compared_at: Utc::now(),
        }
    }
}

/// Per-task lifecycle. Only the terminal states end up in a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Capturing,
    Captured,
    CaptureFailed,
    Comparing,
    Compared { passed: bool },
    ComparisonFailed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Pending => f.write_str("PENDING"),
            TaskState::Capturing => f.write_str("CAPTURING"),
            TaskState::Captured => f.write_str("CAPTURED"),
            TaskState::CaptureFailed => f.write_str("CAPTURE_FAILED"),
            TaskState::Comparing => f.write_str("COMPARING"),
            TaskState::Compared { passed: true } => f.write_str("COMPARED(passed)"),
            TaskState::Compared { passed: false } => f.write_str("COMPARED(failed)"),
            TaskState::ComparisonFailed => f.write_str("COMPARISON_FAILED"),
        }
    }
}

/// Terminal result of one task as recorded in a [`RunReport`].
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The capture succeeded and went through the comparison stage.
    Compared {
        capture: CaptureResult,
        comparison: ComparisonResult,
    },
    CaptureFailed(CaptureResult),
}

impl TaskOutcome {
    pub fn task(&self) -> &CaptureTask {
        match self {
            TaskOutcome::Compared { comparison, .. } => &comparison.task,
            TaskOutcome::CaptureFailed(capture) => &capture.task,
        }
    }

    pub fn capture(&self) -> &CaptureResult {
        match self {
            TaskOutcome::Compared { capture, .. } => capture,
            TaskOutcome::CaptureFailed(capture) => capture,
        }
    }

    pub fn comparison(&self) -> Option<&ComparisonResult> {
        match self {
            TaskOutcome::Compared { comparison, .. } => Some(comparison),
            TaskOutcome::CaptureFailed(_) => None,
        }
    }

    pub fn passed(&self) -> bool {
        self.comparison().map(|c| c.passed).unwrap_or(false)
    }

    /// Match value for results that completed a comparison; `None` otherwise.
    pub fn match_percentage(&self) -> Option<f64> {
        self.comparison()
            .filter(|c| c.status == ComparisonStatus::Compared)
            .map(|c| c.match_percentage)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            TaskOutcome::Compared { comparison, .. } => comparison.failure.as_ref(),
            TaskOutcome::CaptureFailed(capture) => capture.failure.as_ref(),
        }
    }

    pub fn state(&self) -> TaskState {
        match self {
            TaskOutcome::Compared { comparison, .. } => match comparison.status {
                ComparisonStatus::Compared => TaskState::Compared {
                    passed: comparison.passed,
                },
                ComparisonStatus::ComparisonFailed => TaskState::ComparisonFailed,
            },
            TaskOutcome::CaptureFailed(_) => TaskState::CaptureFailed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total_comparisons: usize,
    pub passed: usize,
    pub failed: usize,
    pub average_match_percentage: f64,
}

/// Run-level view built once per invocation and never mutated after it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub timestamp: DateTime<Utc>,
    pub pass_threshold: f64,
    pub results: Vec<TaskOutcome>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.summary.failed == 0
    }
}
