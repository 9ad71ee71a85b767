//! Language presets.
//!
//! Requests that name a language instead of giving run instructions get
//! their build and run commands from here.

pub mod languages;
pub mod presets;
