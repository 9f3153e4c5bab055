//! One `vrc run`: capture the matrix, compare every capture, aggregate and persist.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audit::rules_from_config;
use crate::browser::{is_mock_rendering_enabled, SessionLauncher};
use crate::capture::{build_tasks, CaptureOptions, CellFilter, Orchestrator};
use crate::config::RunConfig;
use crate::diff::{Comparator, ComparisonOptions};
use crate::preflight::check_base_url;
use crate::report::{aggregate, persist, PersistedReport};
use crate::types::{CaptureResult, RunReport, RunStamp, TaskOutcome};
use crate::{Result, VrcError};

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report: RunReport,
    pub persisted: PersistedReport,
}

pub struct Pipeline {
    config: RunConfig,
    launcher: Arc<dyn SessionLauncher>,
    stamp: RunStamp,
    preflight: bool,
}

impl Pipeline {
    /// The preflight check is skipped when fixture rendering is active.
    pub fn new(config: RunConfig, launcher: Arc<dyn SessionLauncher>) -> Self {
        Self {
            config,
            launcher,
            stamp: RunStamp::now(),
            preflight: !is_mock_rendering_enabled(),
        }
    }

    pub fn with_stamp(mut self, stamp: RunStamp) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn with_preflight(mut self, enabled: bool) -> Self {
        self.preflight = enabled;
        self
    }

    pub fn stamp(&self) -> &RunStamp {
        &self.stamp
    }

    /// Runs the whole matrix (or the filtered cell). The report is written even
    /// when tasks failed; only configuration problems and failing to start the
    /// browsers are errors.
    pub async fn run(
        &self,
        filter: Option<&CellFilter>,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutcome> {
        let rules = rules_from_config(&self.config.audit)?;
        let tasks = build_tasks(&self.config, filter)?;
        info!(
            stamp = %self.stamp,
            tasks = tasks.len(),
            output = %self.config.output_dir.display(),
            "starting run"
        );

        if self.preflight {
            check_base_url(&self.config.base_url, self.config.timeouts.preflight).await?;
        }

        let orchestrator = Orchestrator::new(
            Arc::clone(&self.launcher),
            CaptureOptions::from_config(&self.config, self.stamp.clone()),
            rules,
        );
        let captures = orchestrator.run(tasks, cancel).await?;

        let comparator = Comparator::new(
            ComparisonOptions::from_config(&self.config),
            self.config.diffs_dir(),
            self.stamp.clone(),
        );
        let outcomes = tokio::task::spawn_blocking(move || compare_all(&comparator, captures))
            .await
            .map_err(|e| VrcError::Unknown(format!("comparison worker panicked: {e}")))?;

        let report = aggregate(outcomes, self.stamp.started_at(), self.config.pass_threshold);
        info!(
            total = report.summary.total_comparisons,
            passed = report.summary.passed,
            failed = report.summary.failed,
            average = report.summary.average_match_percentage,
            "run finished"
        );
        let persisted = persist(&report, &self.config.output_dir)?;
        Ok(PipelineOutcome { report, persisted })
    }
}

fn compare_all(comparator: &Comparator, captures: Vec<CaptureResult>) -> Vec<TaskOutcome> {
    captures
        .into_iter()
        .map(|capture| {
            if !capture.is_captured() {
                return TaskOutcome::CaptureFailed(capture);
            }
            let comparison = comparator.compare(&capture);
            let outcome = TaskOutcome::Compared {
                capture,
                comparison,
            };
            debug!(task = %outcome.task(), state = %outcome.state(), "terminal");
            outcome
        })
        .collect()
}
