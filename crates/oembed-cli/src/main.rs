//! oembed CLI - discover and fetch oembed documents
//!
//! This is the main entry point for the `oembed` command-line interface.
//! Command implementations live in [`commands`].

use anyhow::{Context, Result};
use clap::Parser;
use oembed_core::{Config, OembedClient};

mod cli;
mod commands;
mod utils;

use cli::{Cli, Commands};
use utils::logging::initialize_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let config = load_config(&cli)?;
    let client = OembedClient::from_config(&config).context("Failed to initialise client")?;

    execute_command(cli.command, &client).await
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(providers) = &cli.providers {
        config.providers.path = Some(providers.clone());
    }
    Ok(config)
}

async fn execute_command(command: Commands, client: &OembedClient) -> Result<()> {
    match command {
        Commands::Links { url, json } => {
            commands::list_links(client, &url, json).await?;
        },

        Commands::Get {
            url,
            format,
            request,
        } => {
            commands::get_for_page(client, &url, format, &request).await?;
        },

        Commands::Fetch { endpoint, request } => {
            commands::fetch_endpoint(client, &endpoint, &request).await?;
        },
    }

    Ok(())
}
