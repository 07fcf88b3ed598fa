//! Resilience CLI library
//!
//! Command definitions and scenario wiring, kept out of `main.rs` so they
//! can be exercised from tests.

pub mod cli;
pub mod scenarios;

pub use cli::{Cli, Commands, OutputFormat, log_filter_from_verbosity};
