//! Core primitives: error taxonomy and file configuration.

pub mod config;
pub mod errors;
