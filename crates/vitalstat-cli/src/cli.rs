use clap::{Parser, Subcommand};

/// Acquire health statistics from the configured providers and hand
/// the bundle to calibration.
#[derive(Debug, Parser)]
#[command(name = "vitalstat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pretty-print the cycle report.
    #[arg(long, global = true)]
    pub pretty: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single acquisition + calibration cycle.
    Run {
        /// Per-provider deadline in seconds, overriding the environment.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Run cycles on a fixed interval until interrupted.
    Schedule {
        /// Seconds between cycle starts.
        #[arg(long, default_value_t = 86_400)]
        every_secs: u64,
    },
}
