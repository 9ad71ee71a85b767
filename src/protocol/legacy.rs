use crate::config::types::{Result, RunnerError};
use crate::core::types::{ExecutionRequest, File, RunInstructions};
use crate::judge::languages::Language;
use crate::judge::presets;
use serde::Deserialize;

/// Request form that names a language instead of carrying run instructions
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LegacyRequest {
    pub language: String,
    pub files: Vec<File>,
    #[serde(default)]
    pub stdin: Option<String>,
    /// Replaces the preset with a single run command when non-empty
    #[serde(default)]
    pub command: Option<String>,
}

impl LegacyRequest {
    /// Resolve run instructions and produce the regular request
    pub fn into_execution_request(self) -> Result<ExecutionRequest> {
        let run_instructions = match self.command.as_deref().map(str::trim) {
            Some(command) if !command.is_empty() => RunInstructions::run_only(command),
            _ => {
                let language = Language::from_name(&self.language)?;
                let (main, others) = self.files.split_first().ok_or_else(|| {
                    RunnerError::Validation("at least one file is required".to_string())
                })?;
                let others: Vec<&str> = others.iter().map(|f| f.name.as_str()).collect();

                log::debug!("Using {} preset with main file {}", language, main.name);
                presets::run_instructions(language, &main.name, &others)
            }
        };

        Ok(ExecutionRequest {
            run_instructions,
            files: self.files,
            stdin: self.stdin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(json: &str) -> LegacyRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn command_overrides_preset() {
        let request = legacy(
            r#"{"language": "python", "files": [{"name": "main.py", "content": "print(1)"}],
                "command": "python3 -u main.py"}"#,
        )
        .into_execution_request()
        .unwrap();

        assert!(request.run_instructions.build_commands.is_empty());
        assert_eq!(request.run_instructions.run_command, "python3 -u main.py");
    }

    #[test]
    fn blank_command_falls_back_to_preset() {
        let request = legacy(
            r#"{"language": "c", "files": [{"name": "main.c", "content": ""},
                {"name": "util.c", "content": ""}], "stdin": "5", "command": "  "}"#,
        )
        .into_execution_request()
        .unwrap();

        assert_eq!(
            request.run_instructions.build_commands,
            vec!["clang -o a.out -lm main.c util.c"]
        );
        assert_eq!(request.run_instructions.run_command, "./a.out");
        assert_eq!(request.stdin.as_deref(), Some("5"));
        assert_eq!(request.files.len(), 2);
    }

    #[test]
    fn unknown_language_without_command_fails() {
        let err = legacy(r#"{"language": "cobra", "files": [{"name": "a", "content": ""}]}"#)
            .into_execution_request()
            .unwrap_err();
        assert!(err.to_string().contains("unsupported language: cobra"));
    }

    #[test]
    fn preset_needs_a_file() {
        let err = legacy(r#"{"language": "python", "files": []}"#)
            .into_execution_request()
            .unwrap_err();
        assert!(matches!(err, RunnerError::Validation(_)));
    }
}
