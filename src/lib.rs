//! code-runner: runs untrusted source code described by a single JSON request
//!
//! One process handles one request: files are staged into a fresh workspace,
//! build commands run in order and stop at the first failure, then the run
//! command executes with the request's stdin. Captured output comes back as
//! one JSON result.
//!
//! # Architecture
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Runner configuration, command modes and the error type
//! - [`config::loader`]: JSON config files and command line overrides
//! - [`config::validator`]: Startup validation
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::signal`]: Async-safe shutdown flag for SIGINT/SIGTERM/SIGHUP
//! - [`kernel::process_group`]: Whole-group termination
//!
//! ## Execution Control ([`exec`])
//! - [`exec::command_line`]: Command line tokenizer
//! - [`exec::executor`]: Child processes with stdin, bounded output, timeouts
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::path_validation`]: File names confined to the workspace
//! - [`safety::workspace`]: Per-request directories with guaranteed removal
//! - [`safety::cleanup`]: Recursive removal that survives hostile permissions
//!
//! ## Core ([`core`])
//! - [`core::types`]: Request and result records
//! - [`core::pipeline`]: Staging, build and run sequencing
//!
//! ## Language Presets ([`judge`])
//! - [`judge::languages`]: Supported languages and their names
//! - [`judge::presets`]: Default build/run instructions per language
//!
//! ## Protocol ([`protocol`])
//! - JSON decoding (regular and legacy forms), encoding and exit status
//!
//! ## Utilities ([`utils`])
//! - [`utils::output`]: Bounded output collection

// Configuration
pub mod config;

// Kernel Primitives
pub mod kernel;

// Execution Control
pub mod exec;

// Safety & Cleanup
pub mod safety;

// Request model and build/run pipeline
pub mod core;

// Language presets for the legacy request form
pub mod judge;

// JSON request/response handling
pub mod protocol;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the code-runner binary
pub mod cli;

pub use config::types::{Result, RunnerConfig, RunnerError};
pub use core::types::{ExecutionRequest, ExecutionResult, File, RunInstructions};
