// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Publish {
            source,
            name,
            publisher,
            description,
            config,
            endpoint,
            token,
            timeout_secs,
            no_progress,
        } => commands::publish(
            &source,
            &name,
            &publisher,
            description,
            config.as_deref(),
            endpoint.as_deref(),
            token.as_deref(),
            timeout_secs,
            no_progress,
        ),
        Commands::Encrypt {
            source,
            output,
            metadata_out,
        } => commands::encrypt(&source, output.as_deref(), &metadata_out),
        Commands::Decrypt {
            encrypted,
            metadata,
            output,
        } => commands::decrypt(&encrypted, &metadata, &output),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            Ok(())
        }
    }
}
