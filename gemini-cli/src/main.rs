//! ## gemini-cli
//! **Operator entrypoint for the application monitor**
//!
//! - `run`: monitor this process for a while and print what it saw
//! - `simulate`: drive seeded synthetic traffic and print the report
//! - `config`: print the effective layered configuration

use clap::Parser;
use gemini_config::GeminiConfig;
use gemini_telemetry::logging::EventLogger;

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GeminiConfig::load()?;
    EventLogger::init(&config.telemetry.log_level);

    match cli.command {
        Commands::Run(args) => commands::run_monitor(args, config).await,
        Commands::Simulate(args) => commands::run_simulation(args, config).await,
        Commands::Config => commands::print_config(&config),
    }
}
