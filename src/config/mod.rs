//! Runner configuration
//!
//! Defaults, JSON config files, command line overrides and startup validation.

pub mod loader;
pub mod types;
pub mod validator;
