//! Playwright-backed browser sessions.
//!
//! Each [`PlaywrightSession`] owns one `node` child running the driver script,
//! so a session's browser survives across tasks and only the context is
//! recreated per page.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::debug;

use super::driver::{
    ensure_node_available, ensure_playwright_available, map_launch_error, map_spawn_error,
    parse_response_line, DriverOp, DriverRequest, DriverResponse, DRIVER_SCRIPT,
};
use super::{BrowserSession, SessionLauncher};
use crate::config::RunConfig;
use crate::types::{CaptureTask, PageLog};
use crate::{Result, VrcError};

/// Default time allowed for the driver to launch Chromium.
pub const DEFAULT_LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a shut-down driver gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration options for browser sessions.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// The Node.js command to use (default: "node").
    pub node_command: String,
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Time allowed between spawning the driver and its ready signal.
    pub launch_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            headless: true,
            launch_timeout: DEFAULT_LAUNCH_TIMEOUT,
        }
    }
}

impl BrowserOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            node_command: config.browser.node_command.clone(),
            headless: config.browser.headless,
            launch_timeout: config.timeouts.launch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    options: BrowserOptions,
}

impl PlaywrightLauncher {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionLauncher for PlaywrightLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let session = PlaywrightSession::start(&self.options).await?;
        Ok(Box::new(session))
    }
}

pub struct PlaywrightSession {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl PlaywrightSession {
    /// Spawns the driver and waits until Chromium is up.
    pub async fn start(options: &BrowserOptions) -> Result<Self> {
        // Fail fast if Node is missing to avoid spawning the driver unnecessarily.
        ensure_node_available(&options.node_command).await?;
        ensure_playwright_available(&options.node_command).await?;

        let mut cmd = Command::new(&options.node_command);
        cmd.arg("-e")
            .arg(DRIVER_SCRIPT)
            .arg(if options.headless { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|err| map_spawn_error(err, &options.node_command))?;

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VrcError::BrowserLaunch("driver stdout was not captured".into()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "vrc::driver", "{line}");
                }
            });
        }

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
        };

        let ready = timeout(options.launch_timeout, session.read_response(0)).await;
        match ready {
            Ok(Ok(response)) if response.status == "ready" => {
                debug!(pid = ?session.child.id(), "browser driver ready");
                Ok(session)
            }
            Ok(Ok(response)) => {
                session.shutdown().await;
                Err(map_launch_error(&response.error_message()))
            }
            Ok(Err(err)) => {
                session.shutdown().await;
                Err(VrcError::BrowserLaunch(format!(
                    "Browser driver exited before it was ready: {err}"
                )))
            }
            Err(_) => {
                session.shutdown().await;
                Err(VrcError::BrowserLaunch(format!(
                    "Browser driver did not become ready within {:?}",
                    options.launch_timeout
                )))
            }
        }
    }

    /// Reads lines until the response for `expected_id`; stale replies and
    /// non-protocol output are skipped.
    async fn read_response(&mut self, expected_id: u64) -> Result<DriverResponse> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(VrcError::Driver(
                    "browser driver closed its output".to_string(),
                ));
            };
            let Some(response) = parse_response_line(&line) else {
                debug!(target: "vrc::driver", "{line}");
                continue;
            };
            if response.id != expected_id {
                debug!(
                    id = response.id,
                    expected = expected_id,
                    "discarding stale driver response"
                );
                continue;
            }
            return Ok(response);
        }
    }

    /// Sends one request and returns the matching response, whatever its status.
    async fn exchange(&mut self, op: &DriverOp) -> Result<DriverResponse> {
        self.next_id += 1;
        let id = self.next_id;
        let mut line = serde_json::to_string(&DriverRequest { id, op })?;
        line.push('\n');

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VrcError::Driver("browser session is shut down".to_string()))?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        self.read_response(id).await
    }

    /// Like [`exchange`](Self::exchange) but turns an error status into [`VrcError::Driver`].
    async fn request(&mut self, op: DriverOp) -> Result<DriverResponse> {
        let response = self.exchange(&op).await?;
        if response.is_ok() {
            Ok(response)
        } else {
            Err(VrcError::Driver(format!(
                "{} failed: {}",
                op.name(),
                response.error_message()
            )))
        }
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn open(&mut self, task: &CaptureTask, timeout: Duration) -> Result<()> {
        let op = DriverOp::Open {
            url: task.url.clone(),
            width: task.viewport.width,
            height: task.viewport.height,
            timeout_ms: timeout.as_millis() as u64,
        };
        let response = self.exchange(&op).await?;
        if response.is_ok() {
            Ok(())
        } else {
            Err(VrcError::navigation(&task.url, response.error_message()))
        }
    }

    async fn add_style(&mut self, css: &str) -> Result<()> {
        self.request(DriverOp::Style {
            css: css.to_string(),
        })
        .await?;
        Ok(())
    }

    async fn fonts_ready(&mut self, timeout: Duration) -> Result<bool> {
        let response = self
            .request(DriverOp::Fonts {
                timeout_ms: timeout.as_millis() as u64,
            })
            .await?;
        Ok(response.ready.unwrap_or(false))
    }

    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value> {
        let response = self
            .request(DriverOp::Evaluate {
                expression: expression.to_string(),
            })
            .await?;
        Ok(response.value.unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&mut self, path: &Path, full_page: bool) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.request(DriverOp::Screenshot {
            path: path.to_string_lossy().into_owned(),
            full_page,
        })
        .await?;
        Ok(())
    }

    async fn close_page(&mut self) -> Result<PageLog> {
        let response = self.request(DriverOp::Close).await?;
        Ok(response.into_page_log())
    }

    async fn shutdown(&mut self) {
        // EOF on stdin ends the driver's read loop and closes the browser.
        drop(self.stdin.take());
        match timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "browser driver exited"),
            Ok(Err(err)) => debug!(error = %err, "waiting for browser driver failed"),
            Err(_) => {
                debug!("browser driver did not exit in time; killing");
                let _ = self.child.kill().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn launch_fails_for_missing_node_binary() {
        let launcher = PlaywrightLauncher::new(BrowserOptions {
            node_command: "definitely-not-a-binary".to_string(),
            ..BrowserOptions::default()
        });
        let err = match launcher.launch().await {
            Ok(_) => panic!("expected launch failure"),
            Err(err) => err,
        };
        assert!(matches!(err, VrcError::BrowserLaunch(_)), "got {err:?}");
        assert_eq!(
            err.failure_category(),
            crate::error::FailureCategory::BrowserLaunchFailure
        );
    }

    #[test]
    fn options_follow_config() {
        let mut config = RunConfig::parse(
            "base_url = \"http://localhost:8080\"\npages = []\nviewports = []\n",
            crate::config::ConfigFormat::Toml,
        )
        .expect("parse config");
        config.browser.node_command = "/opt/node/bin/node".into();
        config.browser.headless = false;
        config.timeouts.launch = Duration::from_secs(12);
        let options = BrowserOptions::from_config(&config);
        assert_eq!(options.node_command, "/opt/node/bin/node");
        assert!(!options.headless);
        assert_eq!(options.launch_timeout, Duration::from_secs(12));
    }
}
