mod cli;
mod config;
mod context;
mod db;
mod embedding;
mod error;
mod memory;
mod server;
mod tools;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "memex", version, about = "Scoped memory and context assembly MCP server for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio unless --sse or server.transport = "sse")
    Serve {
        /// Serve Streamable HTTP on server.host:server.port instead of stdio
        #[arg(long)]
        sse: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Query stored entries from the terminal
    Search(cli::search::SearchArgs),
    /// Assemble context for a scope and print it
    Context(cli::context::ContextArgs),
    /// Import entries, scopes, tags, and relations from a JSON file
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },
    /// Check database health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.memex/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::MemexConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { sse } => {
            if sse || config.server.transport == "sse" {
                server::serve_sse(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
        Command::Search(args) => {
            cli::search::search(&config, args).await?;
        }
        Command::Context(args) => {
            cli::context::context(&config, args).await?;
        }
        Command::Import { file } => {
            cli::import::import(&config, &file)?;
        }
        Command::Doctor => {
            cli::doctor::doctor(&config)?;
        }
    }

    Ok(())
}
