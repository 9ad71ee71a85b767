use crate::config::loader::ConfigOverrides;
use crate::config::types::RunnerConfig;
use crate::config::validator::validate_config;
use crate::core::pipeline::{Pipeline, PipelineSettings};
use crate::exec::executor::ProcessExecutor;
use crate::kernel::process_group;
use crate::kernel::signal::SignalHandler;
use crate::protocol::{self, Response};
use crate::safety::workspace::{UuidNames, WorkspaceManager};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;

/// Reads one JSON request from stdin, builds and runs the code, and writes
/// the JSON result to stdout.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Directory under which per-request workspaces are created
    #[arg(long, value_name = "DIR")]
    path: Option<PathBuf>,
    /// Run command lines through `sh -c` instead of the built-in tokenizer
    #[arg(long)]
    shell: bool,
    /// Wall clock limit for each build command, in seconds
    #[arg(long, value_name = "SECS")]
    build_timeout: Option<u64>,
    /// Wall clock limit for the run command, in seconds
    #[arg(long, value_name = "SECS")]
    run_timeout: Option<u64>,
    /// Capture limit for each of stdout and stderr, in bytes
    #[arg(long, value_name = "BYTES")]
    max_output: Option<usize>,
    /// Skip unpacking the bootstrap archive
    #[arg(long)]
    no_bootstrap: bool,
    /// Include the command duration in nanoseconds in the response
    #[arg(long)]
    report_duration: bool,
    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            workspace_root: self.path.clone(),
            shell: self.shell,
            build_timeout_secs: self.build_timeout,
            run_timeout_secs: self.run_timeout,
            max_output_bytes: self.max_output,
            no_bootstrap: self.no_bootstrap,
            report_duration: self.report_duration,
        }
    }

    /// Config file (or defaults) with command line overrides applied
    fn resolve_config(&self) -> Result<RunnerConfig> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::load_from_file(path)?,
            None => RunnerConfig::default(),
        };
        self.overrides().apply(&mut config);

        let validation = validate_config(&config)?;
        for warning in validation.warnings {
            log::warn!("Configuration warning: {}", warning);
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Stderr)
        .init();
}

/// Read the whole request, giving up when a shutdown signal arrives first
fn read_request(signals: &SignalHandler) -> Result<Option<Vec<u8>>> {
    let mut stdin = std::io::stdin().lock();
    let mut input = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        if signals.shutdown_requested() {
            return Ok(None);
        }
        match stdin.read(&mut chunk) {
            Ok(0) => return Ok(Some(input)),
            Ok(n) => input.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e).context("Failed to read request from stdin"),
        }
    }
}

/// Everything between argument parsing and writing the response.
/// Returns the response and, if a signal cancelled the request, the exit status for it.
fn serve(cli: &Cli) -> Result<(Response, Option<i32>)> {
    let signals = SignalHandler::init().map_err(anyhow::Error::msg)?;
    if let Err(e) = process_group::become_subreaper() {
        log::warn!("Cannot become child subreaper, escaped processes may outlive commands: {}", e);
    }
    let config = cli.resolve_config()?;
    log::debug!("Runner config: {:?}", config);

    let Some(input) = read_request(&signals)? else {
        let name = signals.received_signal().map_or("signal", |sig| sig.as_str());
        log::warn!("Interrupted by {} while reading the request", name);
        let response = Response::failure(format!("Cancelled by {} before the request was read", name));
        return Ok((response, signals.exit_status()));
    };

    let workspaces = WorkspaceManager::new(
        config.workspace_root.clone(),
        config.workspace_prefix.clone(),
        Box::new(UuidNames),
    )?;
    let executor = ProcessExecutor::new(config.command_mode, config.max_output_bytes)
        .with_cancellation(signals.shutdown_flag());
    let pipeline = Pipeline::new(executor, workspaces, PipelineSettings::from_config(&config));

    let response = protocol::handle(&input, &pipeline);

    if let Some(signal) = signals.received_signal() {
        log::warn!("Request interrupted by {}", signal.as_str());
    }
    Ok((response, signals.exit_status()))
}

fn write_response(response: &Response) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&response.body)
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
        .context("Failed to write response to stdout")
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (response, signal_status) = match serve(&cli) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("{:#}", e);
            (Response::failure(format!("{:#}", e)), None)
        }
    };

    write_response(&response)?;

    let status = signal_status.unwrap_or(response.status);
    if status != 0 {
        std::process::exit(status);
    }
    Ok(())
}
