//! Command-line definition

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Resilience control plane CLI
#[derive(Debug, Parser)]
#[command(name = "resilience-cli")]
#[command(author, version, about = "Run resilience and chaos scenarios", long_about = None)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file (default: ./resilience.toml when present)
    #[arg(short, long, env = "RESILIENCE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// How a scenario report is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// One metric per line
    Text,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Drive a synthetic operation through circuit breaker, bulkhead and retry
    ///
    /// Example: resilience-cli resilience --ops 200 --failure-rate 0.3 --seed 7
    Resilience {
        /// Operations to attempt
        #[arg(long, default_value_t = 50)]
        ops: u32,

        /// Chance each synthetic call fails
        #[arg(long, default_value_t = 0.1)]
        failure_rate: f64,

        /// Chance each synthetic call is delayed
        #[arg(long, default_value_t = 0.0)]
        latency_rate: f64,

        /// Seed for the synthetic failures
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run a synthetic operation under latency and fault injection
    Chaos {
        /// Operations to attempt
        #[arg(long, default_value_t = 100)]
        iterations: u32,

        /// Chance each call has a fault injected
        #[arg(long, default_value_t = 0.1)]
        fault_rate: f64,

        /// Skip injected delays
        #[arg(long)]
        no_latency: bool,

        /// Seed shared by every injector
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Create checkpoints, record events and replay from the latest checkpoint
    Recovery {
        /// Checkpoints to create
        #[arg(long, default_value_t = 5)]
        checkpoints: u32,

        /// Events to record
        #[arg(long, default_value_t = 20)]
        events: u32,
    },

    /// Print the merged configuration
    ShowConfig,
}

/// Determine log filter level from verbosity count
pub const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_verbosity_zero() {
        assert_eq!(log_filter_from_verbosity(0), "warn");
    }

    #[test]
    fn log_filter_verbosity_one() {
        assert_eq!(log_filter_from_verbosity(1), "info");
    }

    #[test]
    fn log_filter_verbosity_two() {
        assert_eq!(log_filter_from_verbosity(2), "debug");
    }

    #[test]
    fn log_filter_verbosity_three_or_more() {
        assert_eq!(log_filter_from_verbosity(3), "trace");
        assert_eq!(log_filter_from_verbosity(10), "trace");
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
