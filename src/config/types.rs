/// Core configuration and error types for code-runner
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default per-stream capture limit (8 MB)
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 8 * 1024 * 1024;

/// Archive unpacked into every workspace before files are staged, when present
pub const DEFAULT_BOOTSTRAP_ARCHIVE: &str = "/bootstrap.tar.gz";

/// How a command line from the request is turned into a process
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommandMode {
    /// Split with the built-in tokenizer and exec the program directly
    #[default]
    Direct,
    /// Hand the whole line to `sh -c`
    Shell,
}

impl std::fmt::Display for CommandMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandMode::Direct => write!(f, "direct"),
            CommandMode::Shell => write!(f, "shell"),
        }
    }
}

/// Runner configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Directory under which per-request workspaces are allocated
    pub workspace_root: PathBuf,
    /// Leading component of every workspace directory name
    pub workspace_prefix: String,
    /// Archive unpacked into the workspace before staging (skipped when missing)
    pub bootstrap_archive: Option<PathBuf>,
    /// Command line interpretation
    pub command_mode: CommandMode,
    /// Wall clock limit for each build command
    pub build_timeout_ms: Option<u64>,
    /// Wall clock limit for the run command
    pub run_timeout_ms: Option<u64>,
    /// Capture limit for each of stdout and stderr
    pub max_output_bytes: usize,
    /// Include `duration` (nanoseconds) in the response
    pub report_duration: bool,
}

impl RunnerConfig {
    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_ms.map(Duration::from_millis)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir(),
            workspace_prefix: "code-runner".to_string(),
            bootstrap_archive: Some(PathBuf::from(DEFAULT_BOOTSTRAP_ARCHIVE)),
            command_mode: CommandMode::Direct,
            build_timeout_ms: None,
            run_timeout_ms: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            report_duration: false,
        }
    }
}

/// Custom error types for code-runner
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse request json, {0}")]
    Request(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to {action} '{}': {source}", .path.display())]
    Staging {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File name '{0}' must be a relative path inside the workspace")]
    PathTraversal(String),

    #[error("Failed to unpack bootstrap file: {0}")]
    Bootstrap(String),

    #[error("Failed to serialize response: {0}")]
    Serialize(String),
}

pub type Result<T> = std::result::Result<T, RunnerError>;
