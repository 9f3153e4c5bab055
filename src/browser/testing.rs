//! Scripted in-memory sessions for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{BrowserSession, SessionLauncher};
use crate::types::{CaptureTask, ConsoleMessage, PageLog};
use crate::{Result, VrcError};

/// How a scripted session reacts when a given page is opened.
#[derive(Debug, Clone, Default)]
pub(crate) struct PageScript {
    pub fail_navigation: Option<String>,
    pub hang_on_open: bool,
    pub fail_style: bool,
    pub fonts_ready: bool,
    pub probe_value: serde_json::Value,
    pub console: Vec<ConsoleMessage>,
}

#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub calls: Mutex<Vec<String>>,
    pub launches: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

/// Launcher producing [`ScriptedSession`]s; writes a 1×1 PNG on screenshot.
#[derive(Clone, Default)]
pub(crate) struct ScriptedLauncher {
    pub pages: HashMap<String, PageScript>,
    pub fail_launch_after: Option<usize>,
    pub shared: Arc<Shared>,
}

impl ScriptedLauncher {
    pub fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn launches(&self) -> usize {
        self.shared.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shared.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let launched = self.shared.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = self.fail_launch_after {
            if launched >= limit {
                return Err(VrcError::BrowserLaunch("scripted launch failure".into()));
            }
        }
        Ok(Box::new(ScriptedSession {
            pages: self.pages.clone(),
            shared: self.shared.clone(),
            current: None,
        }))
    }
}

pub(crate) struct ScriptedSession {
    pages: HashMap<String, PageScript>,
    shared: Arc<Shared>,
    current: Option<PageScript>,
}

impl ScriptedSession {
    pub fn with_page(script: PageScript) -> Self {
        Self {
            pages: HashMap::new(),
            shared: Arc::new(Shared::default()),
            current: Some(script),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.shared.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: impl Into<String>) {
        if let Ok(mut calls) = self.shared.calls.lock() {
            calls.push(call.into());
        }
    }

    fn page(&self) -> Result<&PageScript> {
        self.current
            .as_ref()
            .ok_or_else(|| VrcError::Driver("no page is open".into()))
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn open(&mut self, task: &CaptureTask, _timeout: Duration) -> Result<()> {
        self.record(format!("open:{task}"));
        let script = self.pages.get(&task.page_id).cloned().unwrap_or(PageScript {
            fonts_ready: true,
            ..PageScript::default()
        });
        if script.hang_on_open {
            std::future::pending::<()>().await;
        }
        if let Some(message) = &script.fail_navigation {
            return Err(VrcError::navigation(&task.url, message.clone()));
        }
        self.current = Some(script);
        Ok(())
    }

    async fn add_style(&mut self, css: &str) -> Result<()> {
        self.record(format!("style:{}", css.len()));
        if self.page()?.fail_style {
            return Err(VrcError::Driver("style failed: page closed".into()));
        }
        Ok(())
    }

    async fn fonts_ready(&mut self, _timeout: Duration) -> Result<bool> {
        self.record("fonts");
        Ok(self.page()?.fonts_ready)
    }

    async fn evaluate(&mut self, _expression: &str) -> Result<serde_json::Value> {
        self.record("evaluate");
        Ok(self.page()?.probe_value.clone())
    }

    async fn screenshot(&mut self, path: &Path, _full_page: bool) -> Result<()> {
        self.record("screenshot");
        self.page()?;
        let img = image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 128, 0, 255]));
        let bytes = crate::image_loader::encode_png(&img)?;
        crate::image_loader::write_bytes(path, &bytes)?;
        Ok(())
    }

    async fn close_page(&mut self) -> Result<PageLog> {
        self.record("close");
        let console = self.current.take().map(|p| p.console).unwrap_or_default();
        Ok(PageLog {
            console_messages: console,
            page_errors: Vec::new(),
        })
    }

    async fn shutdown(&mut self) {
        self.record("shutdown");
        self.shared.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
