// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod color;
mod commands;
mod exit_error;
mod output;

use clap::{Parser, Subcommand};
use exit_error::ExitError;

#[derive(Parser, Debug)]
#[command(name = "warden", version, styles = color::styles())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a run against an issue and block until it ends.
    Run(commands::run::RunArgs),
    /// Signal a running orchestrator to stop.
    Stop(commands::stop::StopArgs),
    /// Show the last recorded status for an issue's run.
    Status(commands::status::StatusArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("WARDEN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run(args) => commands::run::run(args).await,
        Command::Stop(args) => commands::stop::run(args),
        Command::Status(args) => commands::status::run(args),
    };

    if let Err(err) = result {
        match err.downcast::<ExitError>() {
            Ok(exit_err) => {
                eprintln!("{exit_err}");
                std::process::exit(exit_err.code);
            }
            Err(err) => {
                eprintln!("error: {err:?}");
                std::process::exit(1);
            }
        }
    }
}
