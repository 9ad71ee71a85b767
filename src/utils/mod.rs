//! Utilities
//!
//! Cross-cutting helpers for output collection.

pub mod output;
