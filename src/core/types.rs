use crate::config::types::{Result, RunnerError};
use serde::{Deserialize, Serialize};

/// A file to stage in the workspace. `name` may contain `/` separators.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct File {
    pub name: String,
    pub content: String,
}

/// Build steps followed by the single run step
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunInstructions {
    #[serde(default)]
    pub build_commands: Vec<String>,
    pub run_command: String,
}

impl RunInstructions {
    /// Instructions with only a run command
    pub fn run_only(run_command: impl Into<String>) -> Self {
        Self {
            build_commands: Vec::new(),
            run_command: run_command.into(),
        }
    }
}

/// One request: files to stage, how to build and run them, and stdin text
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub run_instructions: RunInstructions,
    pub files: Vec<File>,
    #[serde(default)]
    pub stdin: Option<String>,
}

impl ExecutionRequest {
    /// Check the invariants serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.files.is_empty() {
            return Err(RunnerError::Validation(
                "at least one file is required".to_string(),
            ));
        }

        if let Some(index) = self.files.iter().position(|f| f.name.trim().is_empty()) {
            return Err(RunnerError::Validation(format!(
                "file at index {} has an empty name",
                index
            )));
        }

        if self.run_instructions.run_command.trim().is_empty() {
            return Err(RunnerError::Validation(
                "runInstructions.runCommand must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Response record. All three text fields are always present.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub error: String,
    /// Wall clock nanoseconds of the last command, when reporting is enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl ExecutionResult {
    /// Result carrying only an error message
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}
