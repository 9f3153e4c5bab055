//! Run configuration: the site under test, the page × viewport matrix and the
//! knobs for capture, comparison and reporting.
//!
//! Config files are TOML by default; `.yaml`/`.yml` and `.json` are accepted too.
//! Keys are snake_case, with camelCase aliases for the names used by the older
//! capture scripts (`baseUrl`, `passThreshold`, `referenceImages`).

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::viewport::NamedViewport;
use crate::{Result, VrcError};

pub const DEFAULT_PASS_THRESHOLD: f64 = 95.0;
pub const DEFAULT_PIXEL_THRESHOLD: f64 = 0.1;
pub const DEFAULT_CONFIG_FILE: &str = "vrc.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    pub pages: Vec<PageSpec>,
    pub viewports: Vec<NamedViewport>,
    #[serde(default = "default_pass_threshold", alias = "passThreshold")]
    pub pass_threshold: f64,
    #[serde(default = "default_output_dir", alias = "outputDir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub comparison: ComparisonConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSpec {
    pub id: String,
    pub path: String,
    /// Reference mock-up per viewport name.
    #[serde(default, alias = "referenceImages")]
    pub reference_images: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Per-pixel perceptual threshold in `0..=1`.
    pub threshold: f64,
    #[serde(alias = "includeAntiAliasing")]
    pub include_anti_aliasing: bool,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_PIXEL_THRESHOLD,
            include_anti_aliasing: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "humantime_serde")]
    pub navigation: Duration,
    #[serde(with = "humantime_serde")]
    pub task: Duration,
    #[serde(with = "humantime_serde", alias = "fontReady")]
    pub font_ready: Duration,
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub launch: Duration,
    #[serde(with = "humantime_serde")]
    pub preflight: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            task: Duration::from_secs(90),
            font_ready: Duration::from_secs(5),
            settle: Duration::from_millis(750),
            launch: Duration::from_secs(30),
            preflight: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    #[serde(alias = "nodeCommand")]
    pub node_command: String,
    pub headless: bool,
    #[serde(alias = "fullPage")]
    pub full_page: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            node_command: "node".to_string(),
            headless: true,
            full_page: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Rule ids to run; empty means every built-in rule.
    pub rules: Vec<String>,
    #[serde(alias = "minTouchTarget")]
    pub min_touch_target: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rules: Vec::new(),
            min_touch_target: 44,
        }
    }
}

fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("visual-regression")
}

fn default_workers() -> usize {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Toml,
        }
    }
}

impl RunConfig {
    /// Reads, parses and validates a config file. Relative reference images and
    /// the output directory resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VrcError::config(format!("Config file not found: {}", path.display()))
            } else {
                VrcError::config(format!("Failed to read config {}: {}", path.display(), e))
            }
        })?;
        let mut config = Self::parse(&contents, ConfigFormat::from_path(path))
            .map_err(|e| VrcError::config(format!("Invalid config ({}): {}", path.display(), e)))?;
        if let Some(base_dir) = path.parent() {
            config.resolve_relative_paths(base_dir);
        }
        config
            .validate()
            .map_err(|e| VrcError::config(format!("Invalid config ({}): {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn parse(contents: &str, format: ConfigFormat) -> std::result::Result<Self, String> {
        match format {
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
        }
    }

    pub fn resolve_relative_paths(&mut self, base_dir: &Path) {
        if self.output_dir.is_relative() {
            self.output_dir = base_dir.join(&self.output_dir);
        }
        for page in &mut self.pages {
            for reference in page.reference_images.values_mut() {
                if reference.is_relative() {
                    *reference = base_dir.join(&*reference);
                }
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| format!("base_url '{}' is not a valid URL: {}", self.base_url, e))?;
        if base.cannot_be_a_base() {
            return Err(format!("base_url '{}' cannot be used as a base", self.base_url));
        }
        if self.pages.is_empty() {
            return Err("at least one [[pages]] entry is required".to_string());
        }
        if self.viewports.is_empty() {
            return Err("at least one [[viewports]] entry is required".to_string());
        }
        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(format!(
                "pass_threshold must be within 0..=100 (got {})",
                self.pass_threshold
            ));
        }
        if !(0.0..=1.0).contains(&self.comparison.threshold) {
            return Err(format!(
                "comparison.threshold must be within 0..=1 (got {})",
                self.comparison.threshold
            ));
        }
        if self.workers == 0 {
            return Err("workers must be at least 1".to_string());
        }

        let mut viewport_names = HashSet::new();
        for viewport in &self.viewports {
            if viewport.name.trim().is_empty() {
                return Err("viewport names must not be empty".to_string());
            }
            check_file_component("viewport name", &viewport.name)?;
            if viewport.width == 0 || viewport.height == 0 {
                return Err(format!(
                    "viewport '{}' must have positive dimensions",
                    viewport.name
                ));
            }
            if !viewport_names.insert(viewport.name.as_str()) {
                return Err(format!("duplicate viewport name '{}'", viewport.name));
            }
        }

        let mut page_ids = HashSet::new();
        for page in &self.pages {
            if page.id.trim().is_empty() {
                return Err("page ids must not be empty".to_string());
            }
            check_file_component("page id", &page.id)?;
            if !page_ids.insert(page.id.as_str()) {
                return Err(format!("duplicate page id '{}'", page.id));
            }
            for name in page.reference_images.keys() {
                if !viewport_names.contains(name.as_str()) {
                    return Err(format!(
                        "page '{}' has a reference image for undeclared viewport '{}'",
                        page.id, name
                    ));
                }
            }
        }

        // `-` separates page and viewport in file names, so `a-b`/`c` and `a`/`b-c` collide.
        let mut stems = HashSet::new();
        for page in &self.pages {
            for viewport in &self.viewports {
                let stem = format!("{}-{}", page.id, viewport.name);
                if !stems.insert(stem.clone()) {
                    return Err(format!(
                        "page '{}' at viewport '{}' shares the file name '{}' with another cell",
                        page.id, viewport.name, stem
                    ));
                }
            }
        }

        Ok(())
    }

    /// Joins a page path onto `base_url`, keeping any path prefix of the base.
    pub fn page_url(&self, page: &PageSpec) -> Result<Url> {
        let mut base = Url::parse(&self.base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(base.join(page.path.trim_start_matches('/'))?)
    }

    pub fn page(&self, id: &str) -> Option<&PageSpec> {
        self.pages.iter().find(|p| p.id == id)
    }

    pub fn viewport(&self, name: &str) -> Option<&NamedViewport> {
        self.viewports.iter().find(|v| v.name == name)
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.output_dir.join("screenshots")
    }

    pub fn diffs_dir(&self) -> PathBuf {
        self.output_dir.join("diffs")
    }
}

/// Page ids and viewport names become file names verbatim.
fn check_file_component(kind: &str, value: &str) -> std::result::Result<(), String> {
    match value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        Some(c) => Err(format!(
            "{kind} '{value}' contains '{c}'; only ASCII letters, digits, '.', '_' and '-' are allowed"
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
base_url = "http://localhost:8080"

[[viewports]]
name = "desktop"
width = 1440
height = 900

[[viewports]]
name = "mobile"
width = 375
height = 812

[[pages]]
id = "home"
path = "/"
[pages.reference_images]
desktop = "mockups/home-desktop.png"
mobile = "mockups/home-mobile.png"

[[pages]]
id = "about"
path = "/about/"
"#;

    fn sample() -> RunConfig {
        RunConfig::parse(SAMPLE, ConfigFormat::Toml).expect("parse sample config")
    }

    #[test]
    fn default_values_match_expected() {
        let cfg = sample();

        assert!((cfg.pass_threshold - 95.0).abs() < f64::EPSILON);
        assert!((cfg.comparison.threshold - 0.1).abs() < f64::EPSILON);
        assert!(!cfg.comparison.include_anti_aliasing);
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.output_dir, PathBuf::from("visual-regression"));
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(30));
        assert_eq!(cfg.timeouts.settle, Duration::from_millis(750));
        assert_eq!(cfg.browser.node_command, "node");
        assert!(cfg.browser.headless);
        assert!(!cfg.audit.enabled);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn can_override_timeouts_and_thresholds() {
        let toml = r#"
base_url = "http://localhost:8080"
pass_threshold = 90.0
workers = 3

[timeouts]
navigation = "12s"
settle = "250ms"

[comparison]
threshold = 0.2
include_anti_aliasing = true

[[viewports]]
name = "desktop"
width = 1440
height = 900

[[pages]]
id = "home"
path = "/"
"#;
        let cfg = RunConfig::parse(toml, ConfigFormat::Toml).expect("parse overrides");

        assert!((cfg.pass_threshold - 90.0).abs() < f64::EPSILON);
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.timeouts.navigation, Duration::from_secs(12));
        assert_eq!(cfg.timeouts.settle, Duration::from_millis(250));
        assert_eq!(cfg.timeouts.task, Duration::from_secs(90));
        assert!((cfg.comparison.threshold - 0.2).abs() < f64::EPSILON);
        assert!(cfg.comparison.include_anti_aliasing);
    }

    #[test]
    fn accepts_camel_case_json() {
        let json = r#"{
            "baseUrl": "http://localhost:8080",
            "passThreshold": 97.5,
            "viewports": [{ "name": "tablet", "width": 768, "height": 1024 }],
            "pages": [{ "id": "home", "path": "/", "referenceImages": { "tablet": "home.png" } }]
        }"#;
        let cfg = RunConfig::parse(json, ConfigFormat::Json).expect("parse json");
        assert!((cfg.pass_threshold - 97.5).abs() < f64::EPSILON);
        assert_eq!(
            cfg.pages[0].reference_images.get("tablet"),
            Some(&PathBuf::from("home.png"))
        );
    }

    #[test]
    fn accepts_yaml() {
        let yaml = "base_url: http://localhost:8080\nviewports:\n  - name: desktop\n    width: 1280\n    height: 720\npages:\n  - id: home\n    path: /\n";
        let cfg = RunConfig::parse(yaml, ConfigFormat::Yaml).expect("parse yaml");
        assert_eq!(cfg.viewports[0].width, 1280);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn format_is_chosen_by_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("vrc.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("vrc.YML")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("vrc.json")), ConfigFormat::Json);
        assert_eq!(ConfigFormat::from_path(Path::new("vrc")), ConfigFormat::Toml);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = sample();
        cfg.pass_threshold = 101.0;
        assert!(cfg.validate().unwrap_err().contains("pass_threshold"));

        let mut cfg = sample();
        cfg.comparison.threshold = 1.5;
        assert!(cfg.validate().unwrap_err().contains("comparison.threshold"));

        let mut cfg = sample();
        cfg.viewports.push(NamedViewport::new("desktop", 10, 10));
        assert!(cfg.validate().unwrap_err().contains("duplicate viewport"));

        let mut cfg = sample();
        cfg.pages[1]
            .reference_images
            .insert("watch".to_string(), PathBuf::from("watch.png"));
        assert!(cfg.validate().unwrap_err().contains("undeclared viewport"));

        let mut cfg = sample();
        cfg.base_url = "not a url".to_string();
        assert!(cfg.validate().unwrap_err().contains("base_url"));

        let mut cfg = sample();
        cfg.workers = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_ids_that_would_share_file_names() {
        let mut cfg = sample();
        cfg.pages[1].id = "blog/post".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("page id 'blog/post' contains '/'"), "{err}");

        let mut cfg = sample();
        cfg.viewports[1].name = "mobile xl".to_string();
        assert!(cfg.validate().unwrap_err().contains("viewport name 'mobile xl'"));

        let mut cfg = sample();
        cfg.pages[0].reference_images.clear();
        cfg.pages[0].id = "blog-desktop".to_string();
        cfg.pages[1].id = "blog".to_string();
        cfg.viewports[1].name = "desktop-desktop".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("shares the file name 'blog-desktop-desktop'"), "{err}");

        let mut cfg = sample();
        cfg.pages[1].id = "blog_post.v2".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn page_url_keeps_base_path_prefix() {
        let mut cfg = sample();
        let about = cfg.pages[1].clone();
        assert_eq!(
            cfg.page_url(&about).unwrap().as_str(),
            "http://localhost:8080/about/"
        );

        cfg.base_url = "http://localhost:8080/staging".to_string();
        assert_eq!(
            cfg.page_url(&about).unwrap().as_str(),
            "http://localhost:8080/staging/about/"
        );

        let home = cfg.pages[0].clone();
        assert_eq!(
            cfg.page_url(&home).unwrap().as_str(),
            "http://localhost:8080/staging/"
        );
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut cfg = sample();
        cfg.resolve_relative_paths(Path::new("/srv/theme"));
        assert_eq!(cfg.output_dir, PathBuf::from("/srv/theme/visual-regression"));
        assert_eq!(
            cfg.pages[0].reference_images["desktop"],
            PathBuf::from("/srv/theme/mockups/home-desktop.png")
        );
    }

    #[test]
    fn load_reports_missing_file() {
        let err = RunConfig::load(Path::new("/definitely/missing/vrc.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
