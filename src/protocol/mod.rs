//! JSON request/response protocol
//!
//! One request object arrives on stdin and one result object leaves on stdout.
//! Objects with a `runInstructions` key are regular requests; anything else
//! is decoded as the language-based [`legacy::LegacyRequest`].

pub mod legacy;

use crate::config::types::{Result, RunnerError};
use crate::core::pipeline::Pipeline;
use crate::core::types::{ExecutionRequest, ExecutionResult};
use crate::exec::executor::CommandRunner;
use legacy::LegacyRequest;

/// Emitted when even the error result cannot be serialized
const FALLBACK_BODY: &[u8] = br#"{"stdout":"","stderr":"","error":"Failed to serialize response"}"#;

/// Decode and validate one request
pub fn decode_request(raw: &[u8]) -> Result<ExecutionRequest> {
    let value: serde_json::Value = serde_json::from_slice(raw)?;

    let request = if value.get("runInstructions").is_some() {
        serde_json::from_value::<ExecutionRequest>(value)?
    } else {
        serde_json::from_value::<LegacyRequest>(value)?.into_execution_request()?
    };

    request.validate()?;
    Ok(request)
}

pub fn encode_result(result: &ExecutionResult) -> Result<Vec<u8>> {
    serde_json::to_vec(result).map_err(|e| RunnerError::Serialize(e.to_string()))
}

/// Encoded response plus the process exit status that goes with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub body: Vec<u8>,
    pub status: i32,
}

impl Response {
    pub fn new(result: &ExecutionResult, status: i32) -> Self {
        match encode_result(result) {
            Ok(body) => Self { body, status },
            Err(e) => {
                log::error!("{}", e);
                Self {
                    body: FALLBACK_BODY.to_vec(),
                    status: 1,
                }
            }
        }
    }

    /// Response for a request that never reached the pipeline
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(&ExecutionResult::from_error(message), 1)
    }
}

/// Decode `raw`, run it, encode the result.
///
/// Status is 0 whenever the request decoded, whatever the user program did.
pub fn handle<R: CommandRunner>(raw: &[u8], pipeline: &Pipeline<R>) -> Response {
    match decode_request(raw) {
        Ok(request) => {
            log::info!(
                "Request with {} file(s), {} build command(s)",
                request.files.len(),
                request.run_instructions.build_commands.len()
            );
            Response::new(&pipeline.execute(&request), 0)
        }
        Err(e) => {
            log::error!("{}", e);
            Response::failure(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::PipelineSettings;
    use crate::exec::executor::{CommandOutput, ExecOptions, StartupError, Termination};
    use crate::safety::workspace::{CounterNames, WorkspaceManager};
    use std::path::Path;
    use std::time::Duration;

    /// Echoes the command line back as stdout
    struct EchoRunner;

    impl CommandRunner for EchoRunner {
        fn run(
            &self,
            command_line: &str,
            _workdir: &Path,
            options: &ExecOptions<'_>,
        ) -> std::result::Result<CommandOutput, StartupError> {
            Ok(CommandOutput {
                stdout: format!("{}|{}", command_line, options.stdin.unwrap_or("")),
                stderr: String::new(),
                termination: Termination::Exited(0),
                duration: Duration::ZERO,
                truncated: false,
            })
        }
    }

    fn body(response: &Response) -> ExecutionResult {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn decodes_run_instructions_form() {
        let request = decode_request(
            br#"{"runInstructions": {"buildCommands": [], "runCommand": "python main.py"},
                 "files": [{"name": "main.py", "content": "print(42)"}], "stdin": null}"#,
        )
        .unwrap();
        assert_eq!(request.run_instructions.run_command, "python main.py");
    }

    #[test]
    fn decodes_legacy_form() {
        let request = decode_request(
            br#"{"language": "ruby", "files": [{"name": "main.rb", "content": "puts 1"}]}"#,
        )
        .unwrap();
        assert_eq!(request.run_instructions.run_command, "ruby main.rb");
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        let err = decode_request(b"{ not json").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse request json, "));

        let err = decode_request(br#"{"runInstructions": {"runCommand": 5}, "files": []}"#).unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse request json, "));
    }

    #[test]
    fn validation_runs_after_decode() {
        let err = decode_request(br#"{"runInstructions": {"runCommand": "x"}, "files": []}"#).unwrap_err();
        assert!(matches!(err, RunnerError::Validation(_)));
    }

    #[test]
    fn handle_runs_pipeline_with_status_zero() {
        let base = tempfile::tempdir().unwrap();
        let workspaces =
            WorkspaceManager::new(base.path().to_path_buf(), "t", Box::new(CounterNames::new("h"))).unwrap();
        let pipeline = Pipeline::new(EchoRunner, workspaces, PipelineSettings::default());

        let response = handle(
            br#"{"runInstructions": {"runCommand": "cat"}, "files": [{"name": "a", "content": ""}], "stdin": "hi"}"#,
            &pipeline,
        );
        assert_eq!(response.status, 0);
        assert_eq!(body(&response).stdout, "cat|hi");
    }

    #[test]
    fn handle_bad_input_gives_error_body_and_status_one() {
        let base = tempfile::tempdir().unwrap();
        let workspaces =
            WorkspaceManager::new(base.path().to_path_buf(), "t", Box::new(CounterNames::new("h"))).unwrap();
        let pipeline = Pipeline::new(EchoRunner, workspaces, PipelineSettings::default());

        let response = handle(b"", &pipeline);
        assert_eq!(response.status, 1);
        let result = body(&response);
        assert!(result.error.starts_with("Failed to parse request json, "));
        assert_eq!(result.stdout, "");
    }

    #[test]
    fn fallback_body_is_valid_result_json() {
        let result: ExecutionResult = serde_json::from_slice(FALLBACK_BODY).unwrap();
        assert!(result.is_error());
    }
}
