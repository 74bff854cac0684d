//! Garrison CLI - manage game servers from the terminal

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set JSON output mode if requested
    output::set_json_mode(cli.json);

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("garrison={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let result = match cli.command {
        Commands::Status => status::execute().await,
        Commands::Start { id } => start::execute(&id).await,
        Commands::Stop { id } => stop::execute(&id).await,
        Commands::Restart { id } => restart::execute(&id).await,
        Commands::Send { id, command } => send::execute(&id, &command.join(" ")).await,
        Commands::Attach { id } => attach::execute(id.as_deref()).await,
        Commands::History { id } => history::execute(&id).await,
        Commands::Backup(args) => backup::execute(args).await,
        Commands::Schedule(args) => schedule::execute(args).await,
        Commands::Files(args) => files::execute(args).await,
        Commands::Update { id } => update::execute(&id).await,
        Commands::Ping => ping::execute().await,
        Commands::Kill => kill::execute().await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
