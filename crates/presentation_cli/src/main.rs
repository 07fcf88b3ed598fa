//! Resilience CLI
//!
//! Runs scenarios from the harness crate against synthetic operations and
//! prints their metric reports. Report samples are also forwarded to the
//! `metrics` facade for any recorder the process installs.

#![allow(clippy::print_stdout)]

use clap::Parser;
use presentation_cli::{Cli, Commands, log_filter_from_verbosity, scenarios};
use resilience::{ResilienceConfig, TelemetryConfig, init_tracing, metrics_sink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ResilienceConfig::load(cli.config.as_deref())?;

    init_tracing(&TelemetryConfig {
        log_filter: log_filter_from_verbosity(cli.verbose).to_string(),
        json: config.telemetry.json,
    })?;

    let report = match cli.command {
        Commands::Resilience {
            ops,
            failure_rate,
            latency_rate,
            seed,
        } => scenarios::resilience(&config, ops, failure_rate, latency_rate, seed).await,

        Commands::Chaos {
            iterations,
            fault_rate,
            no_latency,
            seed,
        } => scenarios::chaos(&config, iterations, fault_rate, no_latency, seed).await,

        Commands::Recovery {
            checkpoints,
            events,
        } => scenarios::recovery(&config, checkpoints, events),

        Commands::ShowConfig => {
            println!("{}", scenarios::render_config(&config, cli.format)?);
            return Ok(());
        },
    };

    metrics_sink::publish(&report.metrics);
    println!("{}", scenarios::render(&report, cli.format)?);
    Ok(())
}
