//! Offline sessions that "render" pages by copying pre-captured PNGs.
//!
//! A page renders to `{dir}/{pageId}-{viewportName}.png`; a task without such a
//! file behaves like a page that failed to load.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{BrowserSession, SessionLauncher};
use crate::types::{CaptureTask, PageLog};
use crate::{Result, VrcError};

/// Directory of fixture renders; when set, no real browser is started.
pub const MOCK_RENDERERS_ENV: &str = "VRC_MOCK_RENDERERS_DIR";

#[derive(Debug, Clone)]
pub struct FixtureLauncher {
    dir: PathBuf,
}

impl FixtureLauncher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_env() -> Option<Self> {
        let dir = std::env::var_os(MOCK_RENDERERS_ENV)?;
        if dir.is_empty() {
            return None;
        }
        Some(Self::new(dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl SessionLauncher for FixtureLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        if !self.dir.is_dir() {
            return Err(VrcError::BrowserLaunch(format!(
                "Fixture directory {} does not exist",
                self.dir.display()
            )));
        }
        Ok(Box::new(FixtureSession::new(self.dir.clone())))
    }
}

#[derive(Debug)]
pub struct FixtureSession {
    dir: PathBuf,
    current: Option<PathBuf>,
}

impl FixtureSession {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, current: None }
    }

    fn current(&self) -> Result<&Path> {
        self.current
            .as_deref()
            .ok_or_else(|| VrcError::Driver("no page is open".to_string()))
    }
}

#[async_trait]
impl BrowserSession for FixtureSession {
    async fn open(&mut self, task: &CaptureTask, _timeout: Duration) -> Result<()> {
        let candidate = self.dir.join(format!("{}.png", task.file_stem()));
        if !candidate.is_file() {
            self.current = None;
            return Err(VrcError::navigation(
                &task.url,
                format!("no fixture render at {}", candidate.display()),
            ));
        }
        self.current = Some(candidate);
        Ok(())
    }

    async fn add_style(&mut self, _css: &str) -> Result<()> {
        self.current()?;
        Ok(())
    }

    async fn fonts_ready(&mut self, _timeout: Duration) -> Result<bool> {
        self.current()?;
        Ok(true)
    }

    async fn evaluate(&mut self, _expression: &str) -> Result<serde_json::Value> {
        self.current()?;
        Ok(serde_json::Value::Null)
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> Result<()> {
        let source = self.current()?.to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&source, path).await?;
        Ok(())
    }

    async fn close_page(&mut self) -> Result<PageLog> {
        self.current = None;
        Ok(PageLog::default())
    }

    async fn shutdown(&mut self) {
        self.current = None;
    }
}
