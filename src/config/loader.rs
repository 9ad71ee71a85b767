/// Configuration loading from a JSON file plus command line overrides
use crate::config::types::{CommandMode, Result, RunnerConfig, RunnerError};
use std::path::{Path, PathBuf};

impl RunnerConfig {
    /// Load configuration from a JSON file. Missing keys keep their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RunnerError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: RunnerConfig = serde_json::from_str(&content).map_err(|e| {
            RunnerError::Config(format!(
                "Failed to parse config JSON {}: {}",
                path.display(),
                e
            ))
        })?;

        log::debug!("Loaded runner config from {}", path.display());
        Ok(config)
    }
}

/// Values given on the command line; `None`/`false` leaves the loaded value alone.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub workspace_root: Option<PathBuf>,
    pub shell: bool,
    pub build_timeout_secs: Option<u64>,
    pub run_timeout_secs: Option<u64>,
    pub max_output_bytes: Option<usize>,
    pub no_bootstrap: bool,
    pub report_duration: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut RunnerConfig) {
        if let Some(root) = &self.workspace_root {
            config.workspace_root = root.clone();
        }
        if self.shell {
            config.command_mode = CommandMode::Shell;
        }
        if let Some(secs) = self.build_timeout_secs {
            config.build_timeout_ms = Some(secs.saturating_mul(1000));
        }
        if let Some(secs) = self.run_timeout_secs {
            config.run_timeout_ms = Some(secs.saturating_mul(1000));
        }
        if let Some(limit) = self.max_output_bytes {
            config.max_output_bytes = limit;
        }
        if self.no_bootstrap {
            config.bootstrap_archive = None;
        }
        if self.report_duration {
            config.report_duration = true;
        }
    }
}
