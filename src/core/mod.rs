//! Language-agnostic runner core.
//!
//! Core owns the request model and the staging/build/run sequence. Language
//! specific defaults live in the judge presets.

pub mod pipeline;
pub mod types;
