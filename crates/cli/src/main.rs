//! FinanBot CLI: the main entry point.
//!
//! Commands:
//! - `onboard`     Write the default config and create the documents folder
//! - `chat`        Interactive advisory session or single-message mode
//! - `serve`       Start the HTTP gateway
//! - `ingest`      Build or rebuild the document index
//! - `indicators`  Print BCRP indicators for a query
//! - `doctor`      Diagnose configuration and connectivity

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod bootstrap;
mod commands;

#[derive(Parser)]
#[command(
    name = "finanbot",
    about = "FinanBot — asesor financiero para el mercado peruano",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.finanbot/config.toml
    #[arg(short, long, global = true, env = "FINANBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration
    Onboard,

    /// Chat with the advisor
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Index the documents folder
    Ingest {
        /// Discard the saved index and re-ingest every document
        #[arg(long)]
        rebuild: bool,
    },

    /// Show the economic data a question would pull in
    Indicators {
        /// The question, e.g. "tipo de cambio hoy"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Chat { message } => {
            commands::chat::run(bootstrap::load_config(config_path)?, message).await?
        }
        Commands::Serve { port } => {
            commands::serve::run(bootstrap::load_config(config_path)?, port).await?
        }
        Commands::Ingest { rebuild } => {
            commands::ingest::run(bootstrap::load_config(config_path)?, rebuild).await?
        }
        Commands::Indicators { query } => {
            commands::indicators::run(bootstrap::load_config(config_path)?, &query.join(" "))
                .await?
        }
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
