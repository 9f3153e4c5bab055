//! Capture orchestration: expands the page × viewport matrix into tasks and
//! drives them through a fixed pool of browser sessions.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::{run_rules, RuleSet};
use crate::browser::{BrowserSession, SessionLauncher};
use crate::config::{PageSpec, RunConfig};
use crate::error::{Failure, FailureCategory};
use crate::stabilizer::{stabilize, StabilizeOptions};
use crate::types::{CaptureResult, CaptureTask, NamedViewport, PageLog, RunStamp, TaskState};
use crate::{Result, VrcError};

/// Restricts a run to a single (page, viewport) cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellFilter {
    pub page: String,
    pub viewport: String,
}

/// Builds one task per (page, viewport) pair in config order, or the single
/// filtered cell. Unknown ids in the filter are configuration errors.
pub fn build_tasks(config: &RunConfig, filter: Option<&CellFilter>) -> Result<Vec<CaptureTask>> {
    if let Some(filter) = filter {
        let page = config
            .page(&filter.page)
            .ok_or_else(|| VrcError::config(format!("Unknown page '{}'", filter.page)))?;
        let viewport = config
            .viewport(&filter.viewport)
            .ok_or_else(|| VrcError::config(format!("Unknown viewport '{}'", filter.viewport)))?;
        return Ok(vec![task_for(config, page, viewport)?]);
    }

    let mut tasks = Vec::with_capacity(config.pages.len() * config.viewports.len());
    for page in &config.pages {
        for viewport in &config.viewports {
            tasks.push(task_for(config, page, viewport)?);
        }
    }
    Ok(tasks)
}

fn task_for(config: &RunConfig, page: &PageSpec, viewport: &NamedViewport) -> Result<CaptureTask> {
    Ok(CaptureTask {
        page_id: page.id.clone(),
        url: config.page_url(page)?.to_string(),
        viewport: viewport.clone(),
        reference_image: page.reference_images.get(&viewport.name).cloned(),
    })
}

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub workers: usize,
    pub navigation_timeout: Duration,
    /// Budget for one task from navigation to closing its context.
    pub task_timeout: Duration,
    pub stabilize: StabilizeOptions,
    pub full_page: bool,
    pub screenshots_dir: PathBuf,
    pub stamp: RunStamp,
}

impl CaptureOptions {
    pub fn from_config(config: &RunConfig, stamp: RunStamp) -> Self {
        Self {
            workers: config.workers,
            navigation_timeout: config.timeouts.navigation,
            task_timeout: config.timeouts.task,
            stabilize: StabilizeOptions::from_config(config),
            full_page: config.browser.full_page,
            screenshots_dir: config.screenshots_dir(),
            stamp,
        }
    }
}

pub struct Orchestrator {
    launcher: Arc<dyn SessionLauncher>,
    options: CaptureOptions,
    rules: RuleSet,
}

impl Orchestrator {
    pub fn new(launcher: Arc<dyn SessionLauncher>, options: CaptureOptions, rules: RuleSet) -> Self {
        Self {
            launcher,
            options,
            rules,
        }
    }

    /// Captures every task and returns one result per task, sorted by page id then
    /// viewport name. Only failing to launch the initial sessions is an error.
    pub async fn run(
        &self,
        tasks: Vec<CaptureTask>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CaptureResult>> {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        for task in &tasks {
            debug!(task = %task, state = %TaskState::Pending, "queued");
        }

        let workers = self.options.workers.clamp(1, tasks.len());
        let mut sessions: Vec<Box<dyn BrowserSession>> = Vec::with_capacity(workers);
        for _ in 0..workers {
            match self.launcher.launch().await {
                Ok(session) => sessions.push(session),
                Err(err) => {
                    for mut session in sessions {
                        session.shutdown().await;
                    }
                    return Err(match err {
                        VrcError::BrowserLaunch(_) => err,
                        other => VrcError::BrowserLaunch(other.to_string()),
                    });
                }
            }
        }
        info!(tasks = tasks.len(), workers, "capturing");

        let queue = Mutex::new(VecDeque::from(tasks));
        let per_worker = join_all(
            sessions
                .into_iter()
                .enumerate()
                .map(|(index, session)| self.worker(index, session, &queue, cancel)),
        )
        .await;

        let mut results: Vec<CaptureResult> = per_worker.into_iter().flatten().collect();
        results.sort_by_key(|result| result.task.key());
        Ok(results)
    }

    async fn worker(
        &self,
        index: usize,
        session: Box<dyn BrowserSession>,
        queue: &Mutex<VecDeque<CaptureTask>>,
        cancel: &CancellationToken,
    ) -> Vec<CaptureResult> {
        let mut session = Some(session);
        let mut results = Vec::new();

        loop {
            let Some(task) = queue.lock().await.pop_front() else {
                break;
            };
            if cancel.is_cancelled() {
                debug!(worker = index, task = %task, state = %TaskState::CaptureFailed, "cancelled");
                results.push(CaptureResult::failed(
                    task,
                    Failure::new(
                        FailureCategory::Cancelled,
                        "Run was cancelled before this task started",
                    ),
                ));
                continue;
            }

            if session.is_none() {
                match self.launcher.launch().await {
                    Ok(relaunched) => {
                        debug!(worker = index, "relaunched browser session");
                        session = Some(relaunched);
                    }
                    Err(err) => {
                        warn!(worker = index, task = %task, error = %err, "browser relaunch failed");
                        results.push(CaptureResult::failed(
                            task,
                            Failure::new(FailureCategory::BrowserLaunchFailure, err.to_string()),
                        ));
                        continue;
                    }
                }
            }
            let Some(active) = session.as_mut() else {
                continue;
            };

            debug!(worker = index, task = %task, state = %TaskState::Capturing, "capturing");
            let outcome = timeout(
                self.options.task_timeout,
                self.capture_one(active.as_mut(), &task),
            )
            .await;

            match outcome {
                Ok(result) => {
                    let state = if result.is_captured() {
                        TaskState::Captured
                    } else {
                        TaskState::CaptureFailed
                    };
                    debug!(worker = index, task = %task, state = %state, "capture finished");
                    results.push(result);
                }
                Err(_) => {
                    warn!(
                        worker = index,
                        task = %task,
                        timeout = ?self.options.task_timeout,
                        "task timed out; recycling browser session"
                    );
                    if let Some(mut stale) = session.take() {
                        stale.shutdown().await;
                    }
                    results.push(CaptureResult::failed(
                        task,
                        Failure::new(
                            FailureCategory::TaskTimeout,
                            format!("Task exceeded {:?}", self.options.task_timeout),
                        ),
                    ));
                }
            }
        }

        if let Some(mut session) = session {
            session.shutdown().await;
        }
        results
    }

    /// Navigates, stabilizes, audits and screenshots one task in a fresh context.
    pub async fn capture_one(
        &self,
        session: &mut dyn BrowserSession,
        task: &CaptureTask,
    ) -> CaptureResult {
        if let Err(err) = session.open(task, self.options.navigation_timeout).await {
            let log = session.close_page().await.unwrap_or_default();
            let category = match err.failure_category() {
                FailureCategory::NavigationTimeout => FailureCategory::NavigationTimeout,
                _ => FailureCategory::NavigationError,
            };
            return CaptureResult::failed(task.clone(), Failure::new(category, err.to_string()))
                .with_log(log);
        }

        let report = stabilize(session, &task.page_id, &self.options.stabilize).await;
        let findings = if self.rules.is_empty() {
            Vec::new()
        } else {
            run_rules(session, &self.rules, &task.viewport, &task.page_id).await
        };

        let path = self
            .options
            .screenshots_dir
            .join(format!("{}-{}.png", task.file_stem(), self.options.stamp));
        let shot = session.screenshot(&path, self.options.full_page).await;

        let log = match session.close_page().await {
            Ok(log) => log,
            Err(err) => {
                warn!(task = %task, error = %err, "closing page failed; console output lost");
                PageLog::default()
            }
        };

        let mut result = match shot {
            Ok(()) => CaptureResult::captured(task.clone(), path, log),
            Err(err) => CaptureResult::failed(
                task.clone(),
                Failure::new(FailureCategory::ScreenshotError, err.to_string()),
            )
            .with_log(log),
        };
        result.stabilization_warnings = report.warnings;
        result.findings = findings;
        result
    }
}
