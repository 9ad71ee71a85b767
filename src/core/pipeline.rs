use crate::config::types::{Result, RunnerConfig, RunnerError};
use crate::core::types::{ExecutionRequest, ExecutionResult};
use crate::exec::command_line;
use crate::exec::executor::{CommandOutput, CommandRunner, ExecOptions, Termination};
use crate::safety::workspace::{Workspace, WorkspaceManager};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipeline states, logged as the request moves through them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Staging,
    Building,
    Running,
    Done,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Staging => write!(f, "staging"),
            Stage::Building => write!(f, "building"),
            Stage::Running => write!(f, "running"),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// The parts of [`RunnerConfig`] the pipeline acts on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineSettings {
    pub build_timeout: Option<Duration>,
    pub run_timeout: Option<Duration>,
    pub bootstrap_archive: Option<PathBuf>,
    pub report_duration: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            build_timeout: config.build_timeout(),
            run_timeout: config.run_timeout(),
            bootstrap_archive: config.bootstrap_archive.clone(),
            report_duration: config.report_duration,
        }
    }
}

/// Stage files, run build commands fail-fast, then run the program
pub struct Pipeline<R: CommandRunner> {
    runner: R,
    workspaces: WorkspaceManager,
    settings: PipelineSettings,
}

impl<R: CommandRunner> Pipeline<R> {
    pub fn new(runner: R, workspaces: WorkspaceManager, settings: PipelineSettings) -> Self {
        Self {
            runner,
            workspaces,
            settings,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute one request. Every failure ends up in the result's `error`.
    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        log::debug!("Pipeline stage: {}", Stage::Staging);
        let workspace = match self.stage(request) {
            Ok(workspace) => workspace,
            Err(e) => {
                log::error!("Staging failed: {}", e);
                log::debug!("Pipeline stage: {}", Stage::Done);
                return ExecutionResult::from_error(e.to_string());
            }
        };

        let result = self.build_and_run(workspace.root(), request);

        log::debug!("Pipeline stage: {}", Stage::Done);
        if let Err(e) = workspace.release() {
            log::warn!("{}", e);
        }

        log::info!(
            "Request finished: {} build command(s), error: {}",
            request.run_instructions.build_commands.len(),
            if result.is_error() { "yes" } else { "no" }
        );
        result
    }

    fn stage(&self, request: &ExecutionRequest) -> Result<Workspace> {
        let workspace = self.workspaces.create_workspace()?;

        if let Some(archive) = &self.settings.bootstrap_archive {
            if archive.is_file() {
                self.unpack_bootstrap(archive, workspace.root())?;
            } else {
                log::debug!("Bootstrap archive {} not present, skipping", archive.display());
            }
        }

        let written = workspace.write_files(&request.files)?;
        log::debug!("Staged {} file(s) in {}", written.len(), workspace.root().display());
        Ok(workspace)
    }

    fn unpack_bootstrap(&self, archive: &Path, root: &Path) -> Result<()> {
        let line = format!("tar -zxf {}", command_line::quote(&archive.to_string_lossy()));
        let options = ExecOptions {
            stdin: None,
            timeout: self.settings.build_timeout,
        };

        let output = self
            .runner
            .run(&line, root, &options)
            .map_err(|e| RunnerError::Bootstrap(e.to_string()))?;

        if !output.success() {
            return Err(RunnerError::Bootstrap(failure_detail("Bootstrap command", &line, &output)));
        }
        Ok(())
    }

    fn build_and_run(&self, root: &Path, request: &ExecutionRequest) -> ExecutionResult {
        let instructions = &request.run_instructions;

        for command in &instructions.build_commands {
            log::debug!("Pipeline stage: {} (`{}`)", Stage::Building, command);
            let options = ExecOptions {
                stdin: None,
                timeout: self.settings.build_timeout,
            };

            match self.runner.run(command, root, &options) {
                Err(e) => {
                    log::debug!("Build command failed to start: {}", e);
                    return ExecutionResult::from_error(e.to_string());
                }
                Ok(output) if !output.success() => {
                    log::debug!("Build command `{}` {}", command, output.termination);
                    let error = failure_detail("Build command", command, &output);
                    return self.result_from(output, error);
                }
                Ok(_) => {}
            }
        }

        log::debug!("Pipeline stage: {} (`{}`)", Stage::Running, instructions.run_command);
        let options = ExecOptions {
            stdin: request.stdin.as_deref(),
            timeout: self.settings.run_timeout,
        };

        match self.runner.run(&instructions.run_command, root, &options) {
            Err(e) => ExecutionResult::from_error(e.to_string()),
            Ok(output) => {
                let error = match output.termination {
                    Termination::TimedOut(limit) => format!("Run command timed out after {:?}", limit),
                    Termination::Cancelled => "Run command was cancelled".to_string(),
                    Termination::Exited(_) | Termination::Signaled(_) => String::new(),
                };
                self.result_from(output, error)
            }
        }
    }

    fn result_from(&self, output: CommandOutput, error: String) -> ExecutionResult {
        let duration = self
            .settings
            .report_duration
            .then(|| u64::try_from(output.duration.as_nanos()).unwrap_or(u64::MAX));

        ExecutionResult {
            stdout: output.stdout,
            stderr: output.stderr,
            error,
            duration,
        }
    }
}

/// Error text for a failed preparatory command: stderr, else stdout, else a
/// message naming the command and how it ended.
fn failure_detail(kind: &str, command: &str, output: &CommandOutput) -> String {
    let summary = format!("{} `{}` {}", kind, command, output.termination);

    match output.termination {
        Termination::TimedOut(_) | Termination::Cancelled => summary,
        _ if !output.stderr.trim().is_empty() => output.stderr.clone(),
        _ if !output.stdout.trim().is_empty() => output.stdout.clone(),
        _ => summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{File, RunInstructions};
    use crate::exec::executor::StartupError;
    use crate::safety::workspace::CounterNames;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq)]
    struct Call {
        line: String,
        stdin: Option<String>,
        timeout: Option<Duration>,
        saw_main_file: bool,
    }

    /// Replies per command line; anything unscripted exits 0 silently
    struct MockRunner {
        calls: Arc<AtomicUsize>,
        log: Arc<Mutex<Vec<Call>>>,
        replies: Vec<(&'static str, Reply)>,
    }

    #[derive(Clone)]
    enum Reply {
        Exit(i32, &'static str, &'static str),
        TimedOut(&'static str),
        NotFound,
    }

    impl MockRunner {
        fn new(replies: Vec<(&'static str, Reply)>) -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                log: Arc::new(Mutex::new(Vec::new())),
                replies,
            }
        }

        fn lines(&self) -> Vec<String> {
            self.log.lock().unwrap().iter().map(|c| c.line.clone()).collect()
        }
    }

    impl CommandRunner for MockRunner {
        fn run(
            &self,
            command_line: &str,
            workdir: &Path,
            options: &ExecOptions<'_>,
        ) -> std::result::Result<CommandOutput, StartupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(Call {
                line: command_line.to_string(),
                stdin: options.stdin.map(str::to_string),
                timeout: options.timeout,
                saw_main_file: workdir.join("main.py").is_file(),
            });

            let reply = self
                .replies
                .iter()
                .find(|(line, _)| *line == command_line)
                .map(|(_, reply)| reply.clone())
                .unwrap_or(Reply::Exit(0, "", ""));

            let output = |termination, stdout: &str, stderr: &str| CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                termination,
                duration: Duration::from_millis(7),
                truncated: false,
            };

            match reply {
                Reply::Exit(code, stdout, stderr) => Ok(output(Termination::Exited(code), stdout, stderr)),
                Reply::TimedOut(stdout) => Ok(output(
                    Termination::TimedOut(Duration::from_millis(100)),
                    stdout,
                    "",
                )),
                Reply::NotFound => Err(StartupError::Spawn {
                    program: command_line.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            }
        }
    }

    fn request(build: &[&str], run: &str, stdin: Option<&str>) -> ExecutionRequest {
        ExecutionRequest {
            run_instructions: RunInstructions {
                build_commands: build.iter().map(|s| s.to_string()).collect(),
                run_command: run.to_string(),
            },
            files: vec![File {
                name: "main.py".to_string(),
                content: "print(42)".to_string(),
            }],
            stdin: stdin.map(str::to_string),
        }
    }

    fn pipeline(base: &Path, runner: MockRunner, settings: PipelineSettings) -> Pipeline<MockRunner> {
        let workspaces =
            WorkspaceManager::new(base.to_path_buf(), "test", Box::new(CounterNames::new("p"))).unwrap();
        Pipeline::new(runner, workspaces, settings)
    }

    fn base_is_empty(base: &Path) -> bool {
        std::fs::read_dir(base).unwrap().next().is_none()
    }

    #[test]
    fn test_empty_build_list_runs_once() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![("python main.py", Reply::Exit(0, "42\n", ""))]);
        let calls = runner.calls.clone();
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let result = pipeline.execute(&request(&[], "python main.py", None));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, ExecutionResult {
            stdout: "42\n".to_string(),
            ..ExecutionResult::default()
        });
        assert!(pipeline.runner().log.lock().unwrap()[0].saw_main_file);
        assert!(base_is_empty(base.path()));
    }

    #[test]
    fn test_failing_build_stops_pipeline() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![(
            "gcc main.c",
            Reply::Exit(1, "", "main.c:1: error: expected ';'\n"),
        )]);
        let calls = runner.calls.clone();
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let result = pipeline.execute(&request(&["gcc main.c", "strip a.out"], "./a.out", None));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.runner().lines(), vec!["gcc main.c"]);
        assert_eq!(result.error, "main.c:1: error: expected ';'\n");
        assert_eq!(result.stderr, "main.c:1: error: expected ';'\n");
        assert!(base_is_empty(base.path()));
    }

    #[test]
    fn test_silent_build_failure_names_command() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![("false", Reply::Exit(1, "", ""))]);
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let result = pipeline.execute(&request(&["false"], "python main.py", None));
        assert_eq!(result.error, "Build command `false` exited with code 1");
    }

    #[test]
    fn test_build_failure_falls_back_to_stdout() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![("make", Reply::Exit(2, "make: *** [all] Error 1\n", " \n"))]);
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let result = pipeline.execute(&request(&["make"], "./a.out", None));
        assert_eq!(result.error, "make: *** [all] Error 1\n");
    }

    #[test]
    fn test_builds_run_in_order_then_run_gets_stdin() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![]);
        let settings = PipelineSettings {
            build_timeout: Some(Duration::from_secs(30)),
            run_timeout: Some(Duration::from_secs(5)),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(base.path(), runner, settings);

        let result = pipeline.execute(&request(&["one", "two"], "three", Some("42")));
        assert!(!result.is_error());

        let log = pipeline.runner().log.lock().unwrap().clone();
        let lines: Vec<_> = log.iter().map(|c| c.line.as_str()).collect();
        assert_eq!(lines, vec!["one", "two", "three"]);
        assert_eq!(log[0].stdin, None);
        assert_eq!(log[0].timeout, Some(Duration::from_secs(30)));
        assert_eq!(log[2].stdin.as_deref(), Some("42"));
        assert_eq!(log[2].timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_run_startup_failure() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![("nope", Reply::NotFound)]);
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let result = pipeline.execute(&request(&[], "nope", None));
        assert!(result.error.starts_with("Failed to start `nope`"));
        assert_eq!(result.stdout, "");
        assert_eq!(result.stderr, "");
        assert!(base_is_empty(base.path()));
    }

    #[test]
    fn test_nonzero_run_exit_is_not_an_error() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![("python main.py", Reply::Exit(1, "", "Traceback\n"))]);
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let result = pipeline.execute(&request(&[], "python main.py", None));
        assert_eq!(result.error, "");
        assert_eq!(result.stderr, "Traceback\n");
    }

    #[test]
    fn test_run_timeout_keeps_streams() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![("loop", Reply::TimedOut("partial\n"))]);
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let result = pipeline.execute(&request(&[], "loop", None));
        assert_eq!(result.error, "Run command timed out after 100ms");
        assert_eq!(result.stdout, "partial\n");
    }

    #[test]
    fn test_staging_error_runs_nothing() {
        let base = tempfile::tempdir().unwrap();
        let runner = MockRunner::new(vec![]);
        let calls = runner.calls.clone();
        let pipeline = pipeline(base.path(), runner, PipelineSettings::default());

        let mut req = request(&["gcc main.c"], "./a.out", None);
        req.files.push(File {
            name: "../outside.c".to_string(),
            content: String::new(),
        });
        let result = pipeline.execute(&req);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(result.error.contains("../outside.c"));
        assert_eq!(result.stdout, "");
        assert!(base_is_empty(base.path()));
    }

    #[test]
    fn test_duration_reported_when_enabled() {
        let base = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            report_duration: true,
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(base.path(), MockRunner::new(vec![]), settings);

        let result = pipeline.execute(&request(&[], "run", None));
        assert_eq!(result.duration, Some(7_000_000));
    }

    #[test]
    fn test_bootstrap_unpacked_before_files() {
        let base = tempfile::tempdir().unwrap();
        let archive = tempfile::NamedTempFile::new().unwrap();
        let settings = PipelineSettings {
            bootstrap_archive: Some(archive.path().to_path_buf()),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(base.path(), MockRunner::new(vec![]), settings);

        pipeline.execute(&request(&[], "run", None));

        let log = pipeline.runner().log.lock().unwrap().clone();
        assert_eq!(log.len(), 2);
        assert!(log[0].line.starts_with("tar -zxf "));
        assert!(!log[0].saw_main_file);
        assert!(log[1].saw_main_file);
    }

    #[test]
    fn test_bootstrap_failure_is_staging_error() {
        let base = tempfile::tempdir().unwrap();
        let archive = tempfile::NamedTempFile::new().unwrap();
        let line: &'static str = Box::leak(
            format!("tar -zxf {}", command_line::quote(&archive.path().to_string_lossy())).into_boxed_str(),
        );
        let runner = MockRunner::new(vec![(line, Reply::Exit(2, "", "gzip: stdin: not in gzip format\n"))]);
        let calls = runner.calls.clone();
        let settings = PipelineSettings {
            bootstrap_archive: Some(archive.path().to_path_buf()),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(base.path(), runner, settings);

        let result = pipeline.execute(&request(&[], "run", None));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.error.starts_with("Failed to unpack bootstrap file"));
        assert!(base_is_empty(base.path()));
    }

    #[test]
    fn test_missing_bootstrap_is_skipped() {
        let base = tempfile::tempdir().unwrap();
        let settings = PipelineSettings {
            bootstrap_archive: Some(PathBuf::from("/nonexistent/bootstrap.tar.gz")),
            ..PipelineSettings::default()
        };
        let pipeline = pipeline(base.path(), MockRunner::new(vec![]), settings);

        pipeline.execute(&request(&[], "run", None));
        assert_eq!(pipeline.runner().lines(), vec!["run"]);
    }

    #[test]
    fn test_settings_from_config() {
        let config = RunnerConfig {
            run_timeout_ms: Some(250),
            report_duration: true,
            bootstrap_archive: None,
            ..RunnerConfig::default()
        };
        let settings = PipelineSettings::from_config(&config);
        assert_eq!(settings.run_timeout, Some(Duration::from_millis(250)));
        assert_eq!(settings.build_timeout, None);
        assert_eq!(settings.bootstrap_archive, None);
        assert!(settings.report_duration);
    }
}
