//! Visual Regression Checker (VRC) Library
//!
//! Captures deterministic screenshots of a site across a page × viewport matrix,
//! compares each one pixel by pixel against a designer mock-up and reports
//! per-cell and run-level pass/fail results.
//!
//! # Module Overview
//!
//! - [`config`] - The `RunConfig` file (pages, viewports, thresholds, timeouts)
//! - [`browser`] - Headless browser sessions (Playwright driver, offline fixtures)
//! - [`stabilizer`] - Makes a rendered page reproducible before its screenshot
//! - [`audit`] - Pluggable layout rules evaluated against the live page
//! - [`capture`] - Task matrix and the worker pool that captures it
//! - [`diff`] - Image comparison engine (canvas reconciliation, pixelmatch)
//! - [`report`] - Aggregation into a `RunReport`, JSON and HTML persistence
//! - [`pipeline`] - One run end to end
//! - [`types`] - Core data types and structures
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tokio_util::sync::CancellationToken;
//! use vrc_lib::{launcher_from_config, Pipeline, RunConfig};
//!
//! # async fn example() -> vrc_lib::Result<()> {
//! let config = RunConfig::load(Path::new("vrc.toml"))?;
//! let launcher = launcher_from_config(&config);
//! let outcome = Pipeline::new(config, launcher)
//!     .run(None, &CancellationToken::new())
//!     .await?;
//! println!("{} failed", outcome.report.summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod browser;
pub mod capture;
pub mod config;
pub mod diff;
pub mod error;
pub mod image_loader;
pub mod output;
pub mod pipeline;
pub mod preflight;
pub mod report;
pub mod stabilizer;
pub mod types;
pub mod viewport;

pub use audit::{LayoutRule, RuleSet};
pub use browser::{
    launcher_from_config, BrowserSession, FixtureLauncher, PlaywrightLauncher, SessionLauncher,
};
pub use capture::{build_tasks, CaptureOptions, CellFilter, Orchestrator};
pub use config::{RunConfig, DEFAULT_CONFIG_FILE, DEFAULT_PASS_THRESHOLD};
pub use diff::{compare_images, Comparator, ComparisonOptions, ImageComparison};
pub use error::{ErrorCategory, ErrorPayload, Failure, FailureCategory, Result, VrcError};
pub use output::{
    DiffOutput, ErrorOutput, ReportArtifacts, ReportDocument, RunOutput, VrcOutput,
    VRC_OUTPUT_VERSION,
};
pub use pipeline::{Pipeline, PipelineOutcome};
pub use report::{aggregate, persist, PersistedReport};
pub use types::{
    CaptureResult, CaptureTask, ComparisonResult, NamedViewport, RunReport, RunStamp,
    TaskOutcome, Viewport,
};
