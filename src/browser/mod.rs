//! Headless browser sessions used by the capture orchestrator.
//!
//! A [`SessionLauncher`] creates [`BrowserSession`]s; a session owns one running
//! browser and renders one page at a time, each in a fresh browsing context.
//!
//! # Module Structure
//!
//! - [`driver`] - Playwright driver script, line protocol and availability checks
//! - [`session`] - Playwright-backed sessions driven over stdin/stdout
//! - [`fixture`] - Sessions that serve pre-rendered PNGs from a directory

mod driver;
mod fixture;
mod session;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RunConfig;
use crate::types::{CaptureTask, PageLog};
use crate::Result;

pub use fixture::{FixtureLauncher, FixtureSession, MOCK_RENDERERS_ENV};
pub use session::{BrowserOptions, PlaywrightLauncher, PlaywrightSession};

/// One running browser. Methods act on the page opened by the last [`open`](Self::open).
#[async_trait]
pub trait BrowserSession: Send {
    /// Opens a fresh context sized to the task viewport and navigates to its URL.
    async fn open(&mut self, task: &CaptureTask, timeout: Duration) -> Result<()>;

    async fn add_style(&mut self, css: &str) -> Result<()>;

    /// Waits for web fonts; `Ok(false)` when they were still loading at `timeout`.
    async fn fonts_ready(&mut self, timeout: Duration) -> Result<bool>;

    /// Evaluates a JavaScript expression in the page and returns its JSON value.
    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value>;

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<()>;

    /// Closes the current context and returns what the page logged.
    async fn close_page(&mut self) -> Result<PageLog>;

    /// Terminates the browser. The session is unusable afterwards.
    async fn shutdown(&mut self);
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}

/// Fixture sessions when `VRC_MOCK_RENDERERS_DIR` is set, Playwright otherwise.
pub fn launcher_from_config(config: &RunConfig) -> Arc<dyn SessionLauncher> {
    if let Some(launcher) = FixtureLauncher::from_env() {
        tracing::info!(dir = %launcher.dir().display(), "using fixture renderer");
        return Arc::new(launcher);
    }
    Arc::new(PlaywrightLauncher::new(BrowserOptions::from_config(config)))
}

pub fn is_mock_rendering_enabled() -> bool {
    driver::is_mock_rendering_enabled()
}

#[cfg(test)]
pub(crate) mod testing;
