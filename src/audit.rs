//! Layout audit rules run against the live page before its screenshot.
//!
//! Each rule contributes a JavaScript probe evaluated in the page and turns the
//! probe's JSON result into findings. Findings are informational: they are
//! reported next to the comparison but never change whether a task passed.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::browser::BrowserSession;
use crate::config::AuditConfig;
use crate::types::{FindingSeverity, LayoutFinding, NamedViewport};
use crate::{Result, VrcError};

/// Widest viewport treated as a touch device.
pub const TOUCH_VIEWPORT_MAX_WIDTH: u32 = 768;
pub const DEFAULT_MIN_TOUCH_TARGET: u32 = 44;

/// How many offending elements a finding lists by name.
const MAX_LISTED: usize = 5;

pub trait LayoutRule: Send + Sync {
    fn id(&self) -> &'static str;

    /// JavaScript expression whose JSON value is passed to [`evaluate`](Self::evaluate).
    fn probe(&self) -> &'static str;

    fn evaluate(&self, value: &Value, viewport: &NamedViewport) -> Vec<LayoutFinding>;
}

pub type RuleSet = Arc<[Box<dyn LayoutRule>]>;

fn finding(rule: &dyn LayoutRule, severity: FindingSeverity, message: String) -> LayoutFinding {
    LayoutFinding {
        rule_id: rule.id().to_string(),
        severity,
        message,
    }
}

/// Content wider than the viewport.
#[derive(Debug, Clone, Copy, Default)]
pub struct HorizontalOverflow;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverflowProbe {
    scroll_width: f64,
    client_width: f64,
}

impl LayoutRule for HorizontalOverflow {
    fn id(&self) -> &'static str {
        "horizontal-overflow"
    }

    fn probe(&self) -> &'static str {
        "(() => ({ scrollWidth: document.documentElement.scrollWidth, clientWidth: document.documentElement.clientWidth }))()"
    }

    fn evaluate(&self, value: &Value, viewport: &NamedViewport) -> Vec<LayoutFinding> {
        let Ok(probe) = OverflowProbe::deserialize(value) else {
            return Vec::new();
        };
        if probe.scroll_width <= probe.client_width {
            return Vec::new();
        }
        vec![finding(
            self,
            FindingSeverity::Error,
            format!(
                "Content is {}px wide in a {}px viewport ({}); the page scrolls horizontally",
                probe.scroll_width, probe.client_width, viewport.name
            ),
        )]
    }
}

/// Interactive elements too small to tap on narrow viewports.
#[derive(Debug, Clone, Copy)]
pub struct TouchTargets {
    pub min_size: u32,
}

impl Default for TouchTargets {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_TOUCH_TARGET,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TouchTargetProbe {
    selector: String,
    width: f64,
    height: f64,
}

impl LayoutRule for TouchTargets {
    fn id(&self) -> &'static str {
        "touch-targets"
    }

    fn probe(&self) -> &'static str {
        r#"(() => Array.from(document.querySelectorAll('a[href], button, input:not([type=hidden]), select, textarea, [role=button]'))
  .slice(0, 500)
  .map((el) => { const r = el.getBoundingClientRect(); return { selector: el.tagName.toLowerCase() + (el.id ? '#' + el.id : ''), width: r.width, height: r.height }; })
  .filter((t) => t.width > 0 && t.height > 0))()"#
    }

    fn evaluate(&self, value: &Value, viewport: &NamedViewport) -> Vec<LayoutFinding> {
        if viewport.width > TOUCH_VIEWPORT_MAX_WIDTH {
            return Vec::new();
        }
        let Ok(targets) = Vec::<TouchTargetProbe>::deserialize(value) else {
            return Vec::new();
        };
        let min = self.min_size as f64;
        let small: Vec<&TouchTargetProbe> = targets
            .iter()
            .filter(|t| t.width < min || t.height < min)
            .collect();
        if small.is_empty() {
            return Vec::new();
        }

        let mut listed: Vec<String> = small
            .iter()
            .take(MAX_LISTED)
            .map(|t| format!("{} ({:.0}x{:.0})", t.selector, t.width, t.height))
            .collect();
        if small.len() > MAX_LISTED {
            listed.push(format!("and {} more", small.len() - MAX_LISTED));
        }
        vec![finding(
            self,
            FindingSeverity::Warning,
            format!(
                "{} touch target(s) smaller than {}px: {}",
                small.len(),
                self.min_size,
                listed.join(", ")
            ),
        )]
    }
}

/// Missing or non-responsive `<meta name="viewport">`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportMeta;

impl LayoutRule for ViewportMeta {
    fn id(&self) -> &'static str {
        "viewport-meta"
    }

    fn probe(&self) -> &'static str {
        r#"(() => { const m = document.querySelector('meta[name="viewport"]'); return m ? m.getAttribute('content') : null; })()"#
    }

    fn evaluate(&self, value: &Value, _viewport: &NamedViewport) -> Vec<LayoutFinding> {
        let message = match value.as_str() {
            None => "Page has no <meta name=\"viewport\"> tag".to_string(),
            Some(content) if !content.replace(' ', "").contains("width=device-width") => {
                format!("Viewport meta tag does not set width=device-width (content: \"{content}\")")
            }
            Some(_) => return Vec::new(),
        };
        vec![finding(self, FindingSeverity::Warning, message)]
    }
}

pub const BUILTIN_RULES: [&str; 3] = ["horizontal-overflow", "touch-targets", "viewport-meta"];

/// Rules enabled by `[audit]`; an empty `rules` list selects every built-in rule.
pub fn rules_from_config(config: &AuditConfig) -> Result<RuleSet> {
    if !config.enabled {
        return Ok(Arc::from(Vec::<Box<dyn LayoutRule>>::new()));
    }
    let names: Vec<&str> = if config.rules.is_empty() {
        BUILTIN_RULES.to_vec()
    } else {
        config.rules.iter().map(String::as_str).collect()
    };

    let mut rules: Vec<Box<dyn LayoutRule>> = Vec::with_capacity(names.len());
    for name in names {
        let rule: Box<dyn LayoutRule> = match name {
            "horizontal-overflow" => Box::new(HorizontalOverflow),
            "touch-targets" => Box::new(TouchTargets {
                min_size: config.min_touch_target,
            }),
            "viewport-meta" => Box::new(ViewportMeta),
            other => {
                return Err(VrcError::config(format!(
                    "Unknown audit rule '{other}' (available: {})",
                    BUILTIN_RULES.join(", ")
                )))
            }
        };
        rules.push(rule);
    }
    Ok(rules.into())
}

/// Runs every rule against the open page. A failing probe is logged and skipped.
pub async fn run_rules(
    session: &mut dyn BrowserSession,
    rules: &[Box<dyn LayoutRule>],
    viewport: &NamedViewport,
    page: &str,
) -> Vec<LayoutFinding> {
    let mut findings = Vec::new();
    for rule in rules {
        match session.evaluate(rule.probe()).await {
            Ok(value) => findings.extend(rule.evaluate(&value, viewport)),
            Err(err) => warn!(page, rule = rule.id(), error = %err, "layout probe failed"),
        }
    }
    findings
}
