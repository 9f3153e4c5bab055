use std::fmt::Write as FmtWrite;
use std::path::Path;

use crate::output::{EntryStatus, ReportDocument, ReportEntry};
use crate::types::FindingSeverity;

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}\
.summary{display:flex;gap:1.5rem;margin-bottom:1.5rem}\
.summary div{padding:.75rem 1rem;border-radius:6px;background:#f3f3f3}\
.cards{display:grid;grid-template-columns:repeat(auto-fill,minmax(320px,1fr));gap:1rem}\
.card{border:1px solid #ddd;border-left-width:6px;border-radius:6px;padding:1rem}\
.card.passed{border-left-color:#2e7d32}.card.failed{border-left-color:#c62828}\
.card.capture-failed,.card.comparison-failed{border-left-color:#ef6c00}\
.card img{max-width:100%;margin-top:.5rem;border:1px solid #eee}\
.reason{color:#c62828}.warn{color:#8a6d00}small{color:#666}";

/// Static page with summary counts and one card per result. Image links are
/// relative to `dir` when the file lives underneath it.
pub fn render_html(document: &ReportDocument, dir: &Path, json_name: &str) -> String {
    let mut buf = String::new();
    writeln!(buf, "<!DOCTYPE html>").ok();
    writeln!(buf, "<html lang=\"en\"><head><meta charset=\"utf-8\">").ok();
    writeln!(
        buf,
        "<title>Visual regression report {}</title>",
        escape(&document.timestamp.to_rfc3339())
    )
    .ok();
    writeln!(buf, "<style>{STYLE}</style></head><body>").ok();
    writeln!(buf, "<h1>Visual regression report</h1>").ok();
    writeln!(
        buf,
        "<p><small>{} &middot; pass threshold {:.2}% &middot; <a href=\"{}\">{}</a></small></p>",
        escape(&document.timestamp.to_rfc3339()),
        document.pass_threshold,
        escape(json_name),
        escape(json_name)
    )
    .ok();

    writeln!(buf, "<section class=\"summary\">").ok();
    writeln!(buf, "<div><strong>{}</strong> total</div>", document.total_comparisons).ok();
    writeln!(buf, "<div><strong>{}</strong> passed</div>", document.passed).ok();
    writeln!(buf, "<div><strong>{}</strong> failed</div>", document.failed).ok();
    writeln!(
        buf,
        "<div><strong>{:.2}%</strong> average match</div>",
        document.average_match
    )
    .ok();
    writeln!(buf, "</section>").ok();

    writeln!(buf, "<section class=\"cards\">").ok();
    for entry in &document.results {
        write_card(&mut buf, entry, dir);
    }
    writeln!(buf, "</section>").ok();
    writeln!(buf, "</body></html>").ok();
    buf
}

fn write_card(buf: &mut String, entry: &ReportEntry, dir: &Path) {
    let (class, label) = match entry.status {
        EntryStatus::Passed => ("passed", "PASS"),
        EntryStatus::Failed => ("failed", "FAIL"),
        EntryStatus::CaptureFailed => ("capture-failed", "CAPTURE FAILED"),
        EntryStatus::ComparisonFailed => ("comparison-failed", "COMPARISON FAILED"),
    };

    writeln!(buf, "<article class=\"card {class}\">").ok();
    writeln!(
        buf,
        "<h2>{} <small>{} ({}x{})</small></h2>",
        escape(&entry.page),
        escape(&entry.viewport),
        entry.width,
        entry.height
    )
    .ok();
    let match_text = entry
        .match_percentage
        .map(|pct| format!("{pct:.2}%"))
        .unwrap_or_else(|| "n/a".to_string());
    writeln!(buf, "<p><strong>{label}</strong> &middot; match {match_text}</p>").ok();
    writeln!(
        buf,
        "<p><small><a href=\"{0}\">{0}</a></small></p>",
        escape(&entry.url)
    )
    .ok();

    if let (Some(category), Some(reason)) = (&entry.failure_category, &entry.failure_reason) {
        writeln!(
            buf,
            "<p class=\"reason\">{}: {}</p>",
            category,
            escape(reason)
        )
        .ok();
    }

    if let Some(diff) = &entry.diff_image_path {
        let href = escape(&link(diff, dir));
        writeln!(
            buf,
            "<a href=\"{href}\"><img src=\"{href}\" alt=\"diff for {} at {}\"></a>",
            escape(&entry.page),
            escape(&entry.viewport)
        )
        .ok();
    }
    if let Some(shot) = &entry.screenshot_path {
        writeln!(
            buf,
            "<p><small><a href=\"{}\">screenshot</a></small></p>",
            escape(&link(shot, dir))
        )
        .ok();
    }

    if !entry.stabilization_warnings.is_empty() || !entry.findings.is_empty() {
        writeln!(buf, "<ul>").ok();
        for warning in &entry.stabilization_warnings {
            writeln!(buf, "<li class=\"warn\">{}</li>", escape(warning)).ok();
        }
        for finding in &entry.findings {
            let severity = match finding.severity {
                FindingSeverity::Info => "info",
                FindingSeverity::Warning => "warning",
                FindingSeverity::Error => "error",
            };
            writeln!(
                buf,
                "<li>[{severity}] {}: {}</li>",
                escape(&finding.rule_id),
                escape(&finding.message)
            )
            .ok();
        }
        writeln!(buf, "</ul>").ok();
    }

    if !entry.console_messages.is_empty() || !entry.page_errors.is_empty() {
        writeln!(
            buf,
            "<p><small>{} console message(s), {} page error(s)</small></p>",
            entry.console_messages.len(),
            entry.page_errors.len()
        )
        .ok();
    }
    writeln!(buf, "</article>").ok();
}

fn link(path: &Path, dir: &Path) -> String {
    path.strip_prefix(dir)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::VRC_OUTPUT_VERSION;
    use chrono::Utc;
    use std::path::PathBuf;

    fn entry(status: EntryStatus) -> ReportEntry {
        ReportEntry {
            page: "home".into(),
            viewport: "mobile".into(),
            width: 375,
            height: 812,
            mockup_path: None,
            url: "http://localhost:8080/?q=<x>".into(),
            status,
            passed: status == EntryStatus::Passed,
            match_percentage: Some(99.5),
            mismatched_pixels: Some(10),
            total_pixels: Some(2000),
            diff_image_path: Some(PathBuf::from("/out/diffs/home-mobile-diff.png")),
            screenshot_path: None,
            timestamp: Utc::now(),
            failure_category: None,
            failure_reason: None,
            console_messages: Vec::new(),
            page_errors: vec!["boom".into()],
            stabilization_warnings: vec!["Fonts not ready".into()],
            findings: Vec::new(),
        }
    }

    fn document(results: Vec<ReportEntry>) -> ReportDocument {
        ReportDocument {
            version: VRC_OUTPUT_VERSION.into(),
            timestamp: Utc::now(),
            pass_threshold: 95.0,
            total_comparisons: results.len(),
            passed: 1,
            failed: 0,
            average_match: 99.5,
            results,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn diff_links_are_relative_to_report_dir() {
        let html = render_html(
            &document(vec![entry(EntryStatus::Passed)]),
            Path::new("/out"),
            "comparison-report-x.json",
        );
        assert!(html.contains("src=\"diffs/home-mobile-diff.png\""));
        assert!(html.contains("href=\"comparison-report-x.json\""));
        assert!(html.contains("99.50%"));
        assert!(html.contains("?q=&lt;x&gt;"));
        assert!(html.contains("Fonts not ready"));
        assert!(html.contains("1 page error(s)"));
    }
}
