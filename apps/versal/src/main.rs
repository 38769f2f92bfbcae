//! # Versal - Puzzle Hunt Server
//!
//! The main binary for the Versal collaborative puzzle hunt.
//!
//! This application provides:
//! - HTTP JSON API server (axum-based)
//! - CLI interface for inspecting and driving game state
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/versal (THE BINARY)              │
//! │                                                      │
//! │      ┌─────────────┐          ┌─────────────┐        │
//! │      │    CLI      │          │  HTTP API   │        │
//! │      │   (clap)    │          │   (axum)    │        │
//! │      └──────┬──────┘          └──────┬──────┘        │
//! │             └───────────┬────────────┘               │
//! │                         ▼                            │
//! │                 ┌───────────────┐                    │
//! │                 │  versal-core  │                    │
//! │                 │  (THE LOGIC)  │                    │
//! │                 └───────┬───────┘                    │
//! │                         ▼                            │
//! │                 redb / in-memory store               │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! versal server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! versal state
//! versal submit -i 1 -a "1"
//! versal --scope-mode participant state -u alice
//! versal --catalog hunt.toml catalog --verbose
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use versal::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // VERSAL_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("VERSAL_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "versal=info,versal_core=info,tower_http=debug".into());

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

/// Print the Versal startup banner.
fn print_banner() {
    println!(
        r#"
  ██╗   ██╗███████╗██████╗ ███████╗ █████╗ ██╗
  ██║   ██║██╔════╝██╔══██╗██╔════╝██╔══██╗██║
  ██║   ██║█████╗  ██████╔╝███████╗███████║██║
  ╚██╗ ██╔╝██╔══╝  ██╔══██╗╚════██║██╔══██║██║
   ╚████╔╝ ███████╗██║  ██║███████║██║  ██║███████╗
    ╚═══╝  ╚══════╝╚═╝  ╚═╝╚══════╝╚═╝  ╚═╝╚══════╝

  Puzzle Hunt Server v{}

  Solve • Unlock • Converge
"#,
        env!("CARGO_PKG_VERSION")
    );
}
