use crate::image_loader::ImageLoadError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use url::ParseError;

#[derive(Debug, Error)]
pub enum VrcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] ParseError),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        url: String,
        message: String,
        timed_out: bool,
    },

    #[error("Browser driver error: {0}")]
    Driver(String),

    #[error("Reference image missing: {0}")]
    ReferenceMissing(PathBuf),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl VrcError {
    pub fn config(message: impl Into<String>) -> Self {
        VrcError::Config(message.into())
    }

    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let timed_out = message.to_ascii_lowercase().contains("timeout");
        VrcError::Navigation {
            url: url.into(),
            message,
            timed_out,
        }
    }

    /// Category recorded on a terminal task result when this error ends a task.
    pub fn failure_category(&self) -> FailureCategory {
        match self {
            VrcError::BrowserLaunch(_) => FailureCategory::BrowserLaunchFailure,
            VrcError::Navigation {
                timed_out: true, ..
            } => FailureCategory::NavigationTimeout,
            VrcError::Navigation { .. } | VrcError::InvalidUrl(_) | VrcError::Network(_) => {
                FailureCategory::NavigationError
            }
            VrcError::ReferenceMissing(_) => FailureCategory::ReferenceMissing,
            VrcError::Image(_) => FailureCategory::ImageDecodeError,
            VrcError::Io(_)
            | VrcError::Serialization(_)
            | VrcError::Config(_)
            | VrcError::Driver(_)
            | VrcError::Unknown(_) => FailureCategory::ScreenshotError,
        }
    }

    pub fn to_failure(&self) -> Failure {
        Failure::new(self.failure_category(), self.to_string())
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            VrcError::Io(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check file paths/permissions and that the output directory is writable.",
            ),
            VrcError::Network(e) => ErrorPayload::new(
                ErrorCategory::Network,
                e.to_string(),
                "Make sure the site under test is running and reachable at base_url.",
            ),
            VrcError::InvalidUrl(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Verify base_url and page paths (e.g., base_url = \"http://localhost:8080\").",
            ),
            VrcError::Image(e) => ErrorPayload::new(
                ErrorCategory::Image,
                e.to_string(),
                "Verify image path/format and readability.",
            ),
            VrcError::Serialization(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Check JSON inputs; run with --verbose for details.",
            ),
            VrcError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("not found") || lower.contains("failed to read config") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Pass --config with the path to vrc.toml (or run from the directory containing it).",
                    )
                } else if lower.contains("unknown page") || lower.contains("unknown viewport") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Use a page id and viewport name declared in the config file.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check the config file and flags (e.g., --page home --viewport desktop).",
                    )
                }
            }
            VrcError::BrowserLaunch(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("playwright npm package is missing") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Install Playwright (e.g., `npm install playwright` and `npx playwright install chromium`).",
                    )
                } else if lower.contains("executable") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Run `npx playwright install chromium` to download the browser.",
                    )
                } else if lower.contains("not found on path") || lower.contains("node command") {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Install Node.js and ensure the node binary is on PATH (or set [browser] node_command).",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        msg.to_string(),
                        "Re-run with --verbose to see the browser driver output.",
                    )
                }
            }
            VrcError::Navigation { message, .. } => ErrorPayload::new(
                ErrorCategory::Network,
                message.to_string(),
                "Try increasing [timeouts] navigation or ensure the page loads without blocking.",
            ),
            VrcError::Driver(msg) => ErrorPayload::new(
                ErrorCategory::Browser,
                msg.to_string(),
                "Re-run with --verbose; the browser driver may have crashed.",
            ),
            VrcError::ReferenceMissing(path) => ErrorPayload::new(
                ErrorCategory::Image,
                format!("Reference image missing: {}", path.display()),
                "Check reference_images paths; they resolve relative to the config file.",
            ),
            VrcError::Unknown(msg) => ErrorPayload::new(
                ErrorCategory::Unknown,
                msg.to_string(),
                "Re-run with --verbose; file an issue if persistent.",
            ),
        }
    }
}

impl From<ImageLoadError> for VrcError {
    fn from(err: ImageLoadError) -> Self {
        match err {
            ImageLoadError::Decode(e) => VrcError::Image(e),
            ImageLoadError::NotFound(path) => VrcError::ReferenceMissing(path),
            ImageLoadError::Read(path, e) => VrcError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            )),
        }
    }
}

pub type Result<T> = std::result::Result<T, VrcError>;

/// Why a single task ended without a usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    ReferenceMissing,
    NavigationTimeout,
    NavigationError,
    ImageDecodeError,
    BrowserLaunchFailure,
    TaskTimeout,
    Cancelled,
    ScreenshotError,
    DiffWriteError,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureCategory::ReferenceMissing => "ReferenceMissing",
            FailureCategory::NavigationTimeout => "NavigationTimeout",
            FailureCategory::NavigationError => "NavigationError",
            FailureCategory::ImageDecodeError => "ImageDecodeError",
            FailureCategory::BrowserLaunchFailure => "BrowserLaunchFailure",
            FailureCategory::TaskTimeout => "TaskTimeout",
            FailureCategory::Cancelled => "Cancelled",
            FailureCategory::ScreenshotError => "ScreenshotError",
            FailureCategory::DiffWriteError => "DiffWriteError",
        };
        f.write_str(name)
    }
}

/// Terminal failure attached to a capture or comparison result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub category: FailureCategory,
    pub reason: String,
}

impl Failure {
    pub fn new(category: FailureCategory, reason: impl Into<String>) -> Self {
        Self {
            category,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Network,
    Browser,
    Image,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
