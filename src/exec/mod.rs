//! Command execution
//!
//! Turns a command line from a request into a child process: tokenizing,
//! spawning in its own process group, feeding stdin, collecting output and
//! enforcing timeouts and cancellation.

pub mod command_line;
pub mod executor;
