//! SmartMix CLI - Automated Mix Assembly
//!
//! Command-line interface for the SmartMix engine.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use smartmix::cli::commands::{self, MixArgs};
use smartmix::cli::{Cli, Commands};
use smartmix::MixError;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("SmartMix v{}", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("SmartMix v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    };

    if let Some(err) = result.as_ref().err().and_then(|e| e.downcast_ref::<MixError>()) {
        for suggestion in err.recovery_suggestions() {
            eprintln!("hint: {}", suggestion);
        }
    }
    result
}

fn handle_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Analyze { inputs, config, json } => {
            commands::analyze(&inputs, config.as_deref(), json).context("Analysis failed")
        }
        Commands::Mix {
            inputs,
            output,
            drums,
            drum_for,
            auto_drums,
            config,
            format,
            crossfade,
            duration,
            order,
            retry_from_start,
            report,
        } => {
            let args = MixArgs {
                inputs,
                output: output.clone(),
                drums,
                drum_for,
                auto_drums,
                config,
                format: format.map(Into::into),
                crossfade,
                duration,
                order: order.map(Into::into),
                retry_from_start,
                report,
            };
            commands::mix(&args).with_context(|| format!("Could not build mix {}", output.display()))
        }
        Commands::Config { config } => commands::print_config(config.as_deref()).context("Invalid configuration"),
    }
}
