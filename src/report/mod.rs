//! Folds task outcomes into a [`RunReport`] and writes the JSON and HTML reports.

mod html;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::diff::round_percentage;
use crate::output::ReportDocument;
use crate::types::{RunReport, RunStamp, RunSummary, TaskOutcome};
use crate::Result;

pub use html::render_html;

/// Builds the run-level view: outcomes sorted by page id then viewport name,
/// pass/fail counts, and the mean match over completed comparisons only.
pub fn aggregate(
    mut outcomes: Vec<TaskOutcome>,
    timestamp: DateTime<Utc>,
    pass_threshold: f64,
) -> RunReport {
    outcomes.sort_by_key(|outcome| outcome.task().key());

    let passed = outcomes.iter().filter(|o| o.passed()).count();
    let matches: Vec<f64> = outcomes.iter().filter_map(TaskOutcome::match_percentage).collect();
    let average_match_percentage = if matches.is_empty() {
        0.0
    } else {
        round_percentage(matches.iter().sum::<f64>() / matches.len() as f64)
    };

    let summary = RunSummary {
        total_comparisons: outcomes.len(),
        passed,
        failed: outcomes.len() - passed,
        average_match_percentage,
    };

    RunReport {
        timestamp,
        pass_threshold,
        results: outcomes,
        summary,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedReport {
    pub json_path: PathBuf,
    pub html_path: PathBuf,
}

/// Writes `comparison-report-{stamp}.json` and `.html` into `dir`.
pub fn persist(report: &RunReport, dir: &Path) -> Result<PersistedReport> {
    fs::create_dir_all(dir)?;
    let stamp = RunStamp::at(report.timestamp);
    let json_path = dir.join(format!("comparison-report-{stamp}.json"));
    let html_path = dir.join(format!("comparison-report-{stamp}.html"));

    let document = ReportDocument::from_report(report);
    fs::write(&json_path, serde_json::to_string_pretty(&document)?)?;

    let json_name = json_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    fs::write(&html_path, render_html(&document, dir, &json_name))?;

    info!(
        json = %json_path.display(),
        html = %html_path.display(),
        "report written"
    );
    Ok(PersistedReport {
        json_path,
        html_path,
    })
}
