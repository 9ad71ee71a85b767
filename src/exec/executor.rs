/// Process execution with captured output, timeouts and cancellation
use crate::config::types::CommandMode;
use crate::exec::command_line::{self, TokenizeError};
use crate::kernel::process_group;
use crate::utils::output::{CollectedOutput, OutputCollector, OutputLimits, PendingOutput};
use nix::sys::signal::Signal;
use std::io::Write;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long output may keep arriving after the command's group is gone
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// A command that could not be started at all
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid command line `{line}`: {source}")]
    CommandLine {
        line: String,
        #[source]
        source: TokenizeError,
    },

    #[error("Failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// How a command ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Exited(i32),
    Signaled(i32),
    TimedOut(Duration),
    Cancelled,
}

impl Termination {
    fn from_status(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => Termination::Exited(code),
            (None, Some(sig)) => Termination::Signaled(sig),
            (None, None) => Termination::Exited(-1),
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Termination::Exited(code) => write!(f, "exited with code {}", code),
            Termination::Signaled(sig) => match Signal::try_from(*sig) {
                Ok(signal) => write!(f, "was terminated by {}", signal.as_str()),
                Err(_) => write!(f, "was terminated by signal {}", sig),
            },
            Termination::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            Termination::Cancelled => write!(f, "was cancelled"),
        }
    }
}

/// Captured result of one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub termination: Termination,
    pub duration: Duration,
    /// Either stream hit the output limit
    pub truncated: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.termination == Termination::Exited(0)
    }
}

/// Per-invocation options
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions<'a> {
    /// Written to the child's stdin, which is then closed
    pub stdin: Option<&'a str>,
    /// Wall clock limit, unlimited when `None`
    pub timeout: Option<Duration>,
}

/// Runs one command line inside a directory
pub trait CommandRunner {
    fn run(
        &self,
        command_line: &str,
        workdir: &Path,
        options: &ExecOptions<'_>,
    ) -> Result<CommandOutput, StartupError>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn run(
        &self,
        command_line: &str,
        workdir: &Path,
        options: &ExecOptions<'_>,
    ) -> Result<CommandOutput, StartupError> {
        (**self).run(command_line, workdir, options)
    }
}

/// Real process executor
pub struct ProcessExecutor {
    mode: CommandMode,
    collector: OutputCollector,
    cancel: Option<&'static AtomicBool>,
}

impl ProcessExecutor {
    pub fn new(mode: CommandMode, max_output_bytes: usize) -> Self {
        Self {
            mode,
            collector: OutputCollector::new(OutputLimits::per_stream(max_output_bytes)),
            cancel: None,
        }
    }

    /// Abort running commands once `flag` becomes true
    pub fn with_cancellation(mut self, flag: &'static AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn argv(&self, line: &str) -> Result<Vec<String>, StartupError> {
        let to_startup = |source| StartupError::CommandLine {
            line: line.to_string(),
            source,
        };

        match self.mode {
            CommandMode::Direct => command_line::split(line).map_err(to_startup),
            CommandMode::Shell => {
                if line.trim().is_empty() {
                    return Err(to_startup(TokenizeError::Empty));
                }
                if line.contains('\0') {
                    return Err(to_startup(TokenizeError::NulByte));
                }
                Ok(vec!["sh".to_string(), "-c".to_string(), line.to_string()])
            }
        }
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn kill_group(&self, child: &Child) {
        if let Err(e) = process_group::kill_group(child.id()) {
            log::warn!("Failed to kill process group {}: {}", child.id(), e);
        }
    }

    /// Wait out the reader threads for at most [`OUTPUT_GRACE`].
    ///
    /// Anything still holding the pipes at this point left the command's
    /// process group; sweep such processes while waiting.
    fn drain_output(&self, mut pending: PendingOutput) -> CollectedOutput {
        let deadline = Instant::now() + OUTPUT_GRACE;
        loop {
            let slice_end = (Instant::now() + MAX_POLL_INTERVAL).min(deadline);
            if pending.receive_until(slice_end) || Instant::now() >= deadline {
                break;
            }
            let killed = process_group::kill_escaped_children();
            if killed > 0 {
                log::debug!("Killed {} escaped process(es)", killed);
            }
        }
        pending.finish()
    }

    /// Poll until the child exits, the timeout expires or cancellation is requested
    fn wait_for_exit(
        &self,
        child: &mut Child,
        program: &str,
        timeout: Option<Duration>,
    ) -> Result<Termination, StartupError> {
        let started = Instant::now();
        let mut interval = MIN_POLL_INTERVAL;

        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(Termination::from_status(status)),
                Ok(None) => {}
                Err(source) => {
                    self.kill_group(child);
                    let _ = child.wait();
                    return Err(StartupError::Wait {
                        program: program.to_string(),
                        source,
                    });
                }
            }

            let stop = match timeout {
                Some(limit) if started.elapsed() >= limit => Some(Termination::TimedOut(limit)),
                _ if self.cancelled() => Some(Termination::Cancelled),
                _ => None,
            };

            if let Some(termination) = stop {
                log::debug!("Stopping `{}`: {}", program, termination);
                self.kill_group(child);
                let _ = child.wait();
                return Ok(termination);
            }

            thread::sleep(interval);
            interval = (interval * 2).min(MAX_POLL_INTERVAL);
        }
    }
}

impl CommandRunner for ProcessExecutor {
    fn run(
        &self,
        command_line: &str,
        workdir: &Path,
        options: &ExecOptions<'_>,
    ) -> Result<CommandOutput, StartupError> {
        let argv = self.argv(command_line)?;
        let program = argv[0].clone();

        if self.cancelled() {
            log::debug!("Not starting `{}`: cancellation requested", command_line);
            return Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                termination: Termination::Cancelled,
                duration: Duration::ZERO,
                truncated: false,
            });
        }

        let started = Instant::now();
        let mut child = Command::new(&program)
            .args(&argv[1..])
            .current_dir(workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|source| StartupError::Spawn {
                program: program.clone(),
                source,
            })?;

        log::debug!("Started `{}` as pid {}", command_line, child.id());

        // Dropping the pipe without input gives the child immediate EOF.
        // The writer is never joined: an escaped process may hold the pipe
        // open without reading it.
        if let (Some(mut pipe), Some(text)) = (child.stdin.take(), options.stdin) {
            if !text.is_empty() {
                let input = text.as_bytes().to_vec();
                thread::spawn(move || {
                    if let Err(e) = pipe.write_all(&input) {
                        if e.kind() != std::io::ErrorKind::BrokenPipe {
                            log::warn!("Failed to write stdin: {}", e);
                        }
                    }
                });
            }
        }

        let pending = self.collector.spawn(child.stdout.take(), child.stderr.take());
        let waited = self.wait_for_exit(&mut child, &program, options.timeout);

        // Descendants may still hold the pipes open
        self.kill_group(&child);

        let collected = self.drain_output(pending);
        let duration = started.elapsed();
        let termination = waited?;

        if collected.abandoned() {
            log::warn!("Output of `{}` was still open after it ended; capture cut short", command_line);
        }

        let truncated = collected.truncated();
        if truncated {
            log::warn!(
                "Output of `{}` exceeded {} bytes and was truncated",
                command_line,
                self.collector.limits().stdout_limit
            );
        }

        log::debug!("`{}` {} in {:?}", command_line, termination, duration);

        Ok(CommandOutput {
            stdout: collected.stdout.into_text(),
            stderr: collected.stderr.into_text(),
            termination,
            duration,
            truncated,
        })
    }
}
