//! Core data types shared by capture, comparison and reporting.
//!
//! - [`CaptureTask`] - one cell of the page × viewport matrix
//! - [`CaptureResult`] - terminal outcome of capturing a task
//! - [`ComparisonResult`] - terminal outcome of diffing a capture against its mock-up
//! - [`TaskOutcome`] / [`RunReport`] - what the aggregator folds and persists

mod results;
mod stamp;
mod task;

pub use crate::viewport::{NamedViewport, Viewport};
pub use results::{
    CaptureResult, CaptureStatus, ComparisonResult, ComparisonStatus, ConsoleMessage,
    FindingSeverity, LayoutFinding, PageLog, RunReport, RunSummary, TaskOutcome, TaskState,
};
pub use stamp::RunStamp;
pub use task::{CaptureTask, TaskKey};
