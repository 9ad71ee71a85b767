//! Safety and cleanup
//!
//! Keeps every request inside its own directory and removes that directory
//! on every exit path.

pub mod cleanup;
pub mod path_validation;
pub mod workspace;
