use std::path::{Path, PathBuf};

use vrc_lib::{RunConfig, VrcError, DEFAULT_CONFIG_FILE};

/// Flags of `vrc run` that override the config file when given.
#[derive(Debug, Default, Clone)]
pub struct RunOverrides {
    pub workers: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub pass_threshold: Option<f64>,
}

impl RunOverrides {
    /// Applies the flags and re-validates the merged config.
    pub fn apply(&self, config: &mut RunConfig) -> Result<(), VrcError> {
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(threshold) = self.pass_threshold {
            config.pass_threshold = threshold;
        }
        config
            .validate()
            .map_err(|e| VrcError::config(format!("Invalid flags: {e}")))
    }
}

/// Explicit path, or `vrc.toml` in the working directory.
pub fn config_path(path: Option<&Path>) -> PathBuf {
    path.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load_config(path: Option<&Path>) -> Result<RunConfig, VrcError> {
    RunConfig::load(&config_path(path))
}

/// Format effective config as a single-line string.
pub fn format_effective_config(config: &RunConfig, source: &Path) -> String {
    let viewports: Vec<String> = config
        .viewports
        .iter()
        .map(|v| format!("{}={}", v.name, v.size()))
        .collect();
    format!(
        "Effective config [{}]: base_url={}, pages={}, viewports=[{}], workers={}, pass_threshold={:.2}, pixel_threshold={:.2}, include_aa={}, timeouts: nav={}ms, task={}ms, fonts={}ms, settle={}ms, output_dir={}, audit={}",
        source.display(),
        config.base_url,
        config.pages.len(),
        viewports.join(", "),
        config.workers,
        config.pass_threshold,
        config.comparison.threshold,
        config.comparison.include_anti_aliasing,
        config.timeouts.navigation.as_millis(),
        config.timeouts.task.as_millis(),
        config.timeouts.font_ready.as_millis(),
        config.timeouts.settle.as_millis(),
        config.output_dir.display(),
        config.audit.enabled,
    )
}
