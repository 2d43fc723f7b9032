mod cli;
mod error;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitalstat_pipeline::{Orchestrator, PipelineConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vitalstat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env();

    match cli.command {
        Command::Run { timeout_secs } => {
            if let Some(secs) = timeout_secs {
                config.cycle_timeout = Duration::from_secs(secs);
            }
            let orchestrator = Orchestrator::from_config(&config);
            let report = orchestrator.run_cycle().await;

            let rendered = if cli.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{rendered}");

            // A cycle always completes; only a failed calibration
            // hand-off is worth a non-zero exit.
            if report.calibration_completed() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(3))
            }
        }
        Command::Schedule { every_secs } => {
            let orchestrator = Orchestrator::from_config(&config);
            vitalstat_pipeline::run_on_interval(&orchestrator, Duration::from_secs(every_secs))
                .await;
            Ok(ExitCode::SUCCESS)
        }
    }
}
