//! # cellpci - PCI Conflict Resolution xApp
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    apps/cellpci (THE BINARY)                 │
//! │                                                              │
//! │  ┌─────────────┐    ┌─────────────┐    ┌────────────────┐    │
//! │  │    CLI      │    │  HTTP API   │    │   Loopback     │    │
//! │  │   (clap)    │    │   (axum)    │    │   transport    │    │
//! │  └──────┬──────┘    └──────┬──────┘    └───────┬────────┘    │
//! │         │                  │                   │             │
//! │         └──────────────────┼───────────────────┘             │
//! │                            ▼                                 │
//! │                   ┌────────────────┐                         │
//! │                   │  cellpci-core  │                         │
//! │                   │  (THE LOGIC)   │                         │
//! │                   └────────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Run the controller and the HTTP API
//! cellpci server --host 0.0.0.0 --port 8080
//!
//! # Replay recorded reports
//! cellpci replay -f reports.json --json-mode
//!
//! # Show the effective configuration
//! cellpci --config cellpci.toml config
//! ```

use cellpci::cli;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // CELLPCI_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("CELLPCI_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cellpci=info,cellpci_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
   ___ ___ _    _    ___  ___ ___
  / __| __| |  | |  | _ \/ __|_ _|
 | (__| _|| |__| |__|  _/ (__ | |
  \___|___|____|____|_|  \___|___|

  PCI Conflict Resolution v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
