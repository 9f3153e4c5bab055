//! Playwright driver process: the inline Node script, its line protocol, and
//! availability checks for Node.js and Playwright.
//!
//! The driver launches Chromium once and then serves one JSON request per stdin
//! line, answering with one JSON response per stdout line carrying the same `id`.

use crate::types::{ConsoleMessage, PageLog};
use crate::{Result, VrcError};
use serde::{Deserialize, Serialize};
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Long-lived Playwright driver. Every page gets its own browser context so no
/// cookies, storage or cache leak between tasks sharing a session.
pub(crate) const DRIVER_SCRIPT: &str = r#"
const [, headlessFlag] = process.argv;
const readline = require('readline');

function reply(payload) {
  process.stdout.write(JSON.stringify(payload) + '\n');
}

function errorMessage(err) {
  return err && err.message ? err.message : String(err);
}

async function main() {
  let chromium;
  try {
    ({ chromium } = require('playwright'));
  } catch (err) {
    reply({ id: 0, status: 'error', message: errorMessage(err) });
    process.exit(1);
  }

  let browser;
  try {
    browser = await chromium.launch({ headless: headlessFlag !== '0' });
  } catch (err) {
    reply({ id: 0, status: 'error', message: errorMessage(err) });
    process.exit(1);
  }

  let context = null;
  let page = null;
  let consoleMessages = [];
  let pageErrors = [];

  async function closeContext() {
    if (context) {
      const ctx = context;
      context = null;
      page = null;
      await ctx.close().catch(() => {});
    }
  }

  const handlers = {
    async open(req) {
      await closeContext();
      consoleMessages = [];
      pageErrors = [];
      context = await browser.newContext({
        viewport: { width: req.width, height: req.height }
      });
      page = await context.newPage();
      page.on('console', (msg) => consoleMessages.push({ level: msg.type(), text: msg.text() }));
      page.on('pageerror', (err) => pageErrors.push(errorMessage(err)));
      await page.goto(req.url, { waitUntil: 'networkidle', timeout: req.timeoutMs });
      return {};
    },
    async style(req) {
      await page.addStyleTag({ content: req.css });
      return {};
    },
    async fonts(req) {
      const ready = await page.evaluate((ms) => Promise.race([
        document.fonts.ready.then(() => true),
        new Promise((resolve) => setTimeout(() => resolve(false), ms))
      ]), req.timeoutMs);
      return { ready };
    },
    async evaluate(req) {
      const value = await page.evaluate(req.expression);
      return { value: value === undefined ? null : value };
    },
    async screenshot(req) {
      await page.screenshot({ path: req.path, fullPage: req.fullPage });
      return {};
    },
    async close() {
      const logs = { consoleMessages, pageErrors };
      await closeContext();
      consoleMessages = [];
      pageErrors = [];
      return logs;
    }
  };

  reply({ id: 0, status: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    let req;
    try {
      req = JSON.parse(line);
    } catch (err) {
      continue;
    }
    const handler = handlers[req.op];
    if (!handler) {
      reply({ id: req.id, status: 'error', message: `unknown op ${req.op}` });
      continue;
    }
    if (req.op !== 'open' && req.op !== 'close' && !page) {
      reply({ id: req.id, status: 'error', message: 'no page is open' });
      continue;
    }
    try {
      const result = await handler(req);
      reply(Object.assign({ id: req.id, status: 'ok' }, result));
    } catch (err) {
      reply({ id: req.id, status: 'error', message: errorMessage(err) });
    }
  }

  await closeContext();
  await browser.close();
}

main();
"#;

/// Timeout for checking node/playwright availability.
pub(crate) const NODE_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Script to check if Playwright is installed.
const PLAYWRIGHT_CHECK_SCRIPT: &str = "require('playwright'); process.stdout.write('ok');";

/// One request line sent to the driver.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub(crate) enum DriverOp {
    #[serde(rename_all = "camelCase")]
    Open {
        url: String,
        width: u32,
        height: u32,
        timeout_ms: u64,
    },
    Style {
        css: String,
    },
    #[serde(rename_all = "camelCase")]
    Fonts {
        timeout_ms: u64,
    },
    Evaluate {
        expression: String,
    },
    #[serde(rename_all = "camelCase")]
    Screenshot {
        path: String,
        full_page: bool,
    },
    Close,
}

impl DriverOp {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            DriverOp::Open { .. } => "open",
            DriverOp::Style { .. } => "style",
            DriverOp::Fonts { .. } => "fonts",
            DriverOp::Evaluate { .. } => "evaluate",
            DriverOp::Screenshot { .. } => "screenshot",
            DriverOp::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct DriverRequest<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub op: &'a DriverOp,
}

/// One response line read from the driver.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriverResponse {
    pub id: u64,
    pub status: String,
    pub message: Option<String>,
    pub ready: Option<bool>,
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub console_messages: Vec<ConsoleMessage>,
    #[serde(default)]
    pub page_errors: Vec<String>,
}

impl DriverResponse {
    pub(crate) fn is_ok(&self) -> bool {
        self.status == "ok" || self.status == "ready"
    }

    pub(crate) fn error_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("driver returned status '{}'", self.status))
    }

    pub(crate) fn into_page_log(self) -> PageLog {
        PageLog {
            console_messages: self.console_messages,
            page_errors: self.page_errors,
        }
    }
}

/// Parses a stdout line; anything that is not a driver response yields `None`.
pub(crate) fn parse_response_line(line: &str) -> Option<DriverResponse> {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

/// Maps a spawn error to an appropriate VrcError.
pub(crate) fn map_spawn_error(err: io::Error, command: &str) -> VrcError {
    if err.kind() == io::ErrorKind::NotFound {
        VrcError::BrowserLaunch(format!(
            "Unable to spawn browser driver; '{}' was not found on PATH",
            command
        ))
    } else {
        VrcError::Io(err)
    }
}

/// Maps a failed driver start (stderr text or error message) to a launch error.
pub(crate) fn map_launch_error(detail: &str) -> VrcError {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("cannot find module 'playwright'") {
        return VrcError::BrowserLaunch(
            "Playwright npm package is missing; install with `npm install playwright`."
                .to_string(),
        );
    }

    if lower.contains("executable doesn't exist") || lower.contains("npx playwright install") {
        return VrcError::BrowserLaunch(format!(
            "Chromium executable is not installed: {}",
            first_line(detail)
        ));
    }

    VrcError::BrowserLaunch(format!("Browser driver failed to start: {}", detail.trim()))
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

/// Checks if fixture rendering is enabled via environment variables.
pub(crate) fn is_mock_rendering_enabled() -> bool {
    std::env::var_os(super::fixture::MOCK_RENDERERS_ENV).is_some()
}

/// Ensures Node.js is available on the system.
pub(crate) async fn ensure_node_available(node_command: &str) -> Result<()> {
    let mut cmd = Command::new(node_command);
    cmd.arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let status = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.status())
        .await
        .map_err(|_| {
            VrcError::BrowserLaunch(format!(
                "Timed out checking node availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !status.success() {
        return Err(VrcError::BrowserLaunch(format!(
            "Node command {:?} is not available (exit {})",
            node_command, status
        )));
    }

    Ok(())
}

/// Ensures Playwright npm package is installed.
pub(crate) async fn ensure_playwright_available(node_command: &str) -> Result<()> {
    if is_mock_rendering_enabled() {
        return Ok(());
    }

    let mut cmd = Command::new(node_command);
    cmd.arg("-e")
        .arg(PLAYWRIGHT_CHECK_SCRIPT)
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let output = tokio::time::timeout(NODE_CHECK_TIMEOUT, cmd.output())
        .await
        .map_err(|_| {
            VrcError::BrowserLaunch(format!(
                "Timed out checking Playwright availability after {:?}",
                NODE_CHECK_TIMEOUT
            ))
        })?
        .map_err(|err| map_spawn_error(err, node_command))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(map_launch_error(&stderr));
    }

    Ok(())
}
