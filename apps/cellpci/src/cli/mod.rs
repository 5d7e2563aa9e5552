//! # cellpci CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Run the controller and the HTTP API
//! - `replay` - Feed a file of reports through the controller
//! - `config` - Show the effective configuration

mod commands;

use crate::config::AppConfig;
use cellpci_core::PciError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// cellpci - PCI conflict detection and resolution
///
/// Watches per-cell reports, finds PCI collisions within two neighbor hops
/// and reassigns a free PCI from the cell's pools.
#[derive(Parser, Debug)]
#[command(name = "cellpci")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller and the HTTP API
    Server {
        /// Host to bind to (overrides server.host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Replay a JSON array of reports and print the outcome
    Replay {
        /// Path to the reports file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), PciError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Replay { file }) => cmd_replay(&config, json_mode, &file).await,
        Some(Commands::Config) | None => cmd_config(&config, json_mode),
    }
}
