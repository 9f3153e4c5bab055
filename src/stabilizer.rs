//! Puts a loaded page into a reproducible visual state before it is captured.
//!
//! Stabilization is best effort: a step that fails or times out becomes a
//! warning on the capture, never a task failure.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::browser::BrowserSession;
use crate::config::RunConfig;

/// Zeroes every animation and transition, including pseudo-elements.
pub const FREEZE_CSS: &str = "*, *::before, *::after {\
 animation-duration: 0s !important;\
 animation-delay: 0s !important;\
 transition-duration: 0s !important;\
 transition-delay: 0s !important;\
}";

/// Upper bound for injecting the freeze stylesheet.
const STYLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Slack on top of the in-page font wait before the call itself is abandoned.
const FONT_CALL_SLACK: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilizeOptions {
    pub font_ready_timeout: Duration,
    /// Quiet period after fonts are ready so late layout can settle.
    pub settle: Duration,
}

impl Default for StabilizeOptions {
    fn default() -> Self {
        Self {
            font_ready_timeout: Duration::from_secs(5),
            settle: Duration::from_millis(750),
        }
    }
}

impl StabilizeOptions {
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            font_ready_timeout: config.timeouts.font_ready,
            settle: config.timeouts.settle,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StabilizationReport {
    pub animations_frozen: bool,
    pub fonts_ready: bool,
    pub warnings: Vec<String>,
}

impl StabilizationReport {
    fn warn(&mut self, page: &str, message: String) {
        warn!(page, "{message}");
        self.warnings.push(message);
    }
}

/// Freezes motion, waits for fonts, then waits out the settle delay.
pub async fn stabilize(
    session: &mut dyn BrowserSession,
    page: &str,
    options: &StabilizeOptions,
) -> StabilizationReport {
    let mut report = StabilizationReport::default();

    let injected = timeout(STYLE_TIMEOUT, session.add_style(FREEZE_CSS)).await;
    match injected {
        Ok(Ok(())) => report.animations_frozen = true,
        Ok(Err(err)) => report.warn(page, format!("Could not disable animations: {err}")),
        Err(_) => report.warn(
            page,
            format!("Disabling animations timed out after {STYLE_TIMEOUT:?}"),
        ),
    }

    let fonts = timeout(
        options.font_ready_timeout + FONT_CALL_SLACK,
        session.fonts_ready(options.font_ready_timeout),
    )
    .await;
    match fonts {
        Ok(Ok(true)) => report.fonts_ready = true,
        Ok(Ok(false)) | Err(_) => report.warn(
            page,
            format!(
                "Fonts not ready after {:?}; capturing anyway",
                options.font_ready_timeout
            ),
        ),
        Ok(Err(err)) => report.warn(page, format!("Font readiness check failed: {err}")),
    }

    if !options.settle.is_zero() {
        sleep(options.settle).await;
    }

    report
}
