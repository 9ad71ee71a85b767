// Config validation: reject settings that can never run a request, warn on risky ones

use crate::config::types::{CommandMode, Result, RunnerConfig, RunnerError};

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate config at startup. Errors are fatal, warnings are returned for logging.
pub fn validate_config(config: &RunnerConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_limits(config, &mut result);
    validate_paths(config, &mut result);

    if config.command_mode == CommandMode::Shell {
        result.add_warning(
            "Shell command mode passes request commands to `sh -c`; operators, redirection and expansion are live"
                .to_string(),
        );
    }

    if !result.is_valid() {
        return Err(RunnerError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_limits(config: &RunnerConfig, result: &mut ValidationResult) {
    if config.build_timeout_ms == Some(0) {
        result.add_error("Build timeout must be greater than 0".to_string());
    }

    if config.run_timeout_ms == Some(0) {
        result.add_error("Run timeout must be greater than 0".to_string());
    }

    if config.max_output_bytes == 0 {
        result.add_error("Output limit must be greater than 0 bytes".to_string());
    } else if config.max_output_bytes < 1024 {
        result.add_warning(format!(
            "Output limit is very low ({} bytes), output will likely be truncated",
            config.max_output_bytes
        ));
    }
}

fn validate_paths(config: &RunnerConfig, result: &mut ValidationResult) {
    if config.workspace_prefix.is_empty() {
        result.add_error("Workspace prefix must not be empty".to_string());
    } else if config.workspace_prefix.contains('/') || config.workspace_prefix.contains('\0') {
        result.add_error(format!(
            "Workspace prefix '{}' must be a single path component",
            config.workspace_prefix
        ));
    }

    if !config.workspace_root.exists() {
        result.add_warning(format!(
            "Workspace root {} does not exist and will be created",
            config.workspace_root.display()
        ));
    } else if !config.workspace_root.is_dir() {
        result.add_error(format!(
            "Workspace root {} is not a directory",
            config.workspace_root.display()
        ));
    }
}
