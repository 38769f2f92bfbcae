//! # Versal CLI Module
//!
//! This module implements the CLI interface for Versal.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `state` - Show the game state and grid for a scope
//! - `submit` - Submit an answer for a puzzle
//! - `reset` - Reset a scope to an empty state
//! - `catalog` - Validate and print the puzzle catalog

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use versal_core::VersalError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Versal - collaborative puzzle hunt server
///
/// Nine puzzles, three paths, one shared grid.
#[derive(Parser, Debug)]
#[command(name = "versal")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the state database (redb backend)
    #[arg(short = 'D', long, global = true, default_value = "versal.db")]
    pub database: PathBuf,

    /// Storage backend: "redb" (persistent) or "memory" (lost on exit)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Puzzle catalog TOML file (default: the built-in nine-puzzle hunt)
    #[arg(short = 'C', long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Scope mode: "global" (one shared record) or "participant"
    #[arg(short = 'S', long, global = true, default_value = "global")]
    pub scope_mode: String,

    /// Locked-puzzle policy: "ignore" (correctness only) or "enforce"
    #[arg(long, global = true, default_value = "ignore")]
    pub lock_policy: String,

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
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show the game state and grid
    State {
        /// Participant identity (participant scope mode)
        #[arg(short = 'u', long)]
        participant: Option<String>,
    },

    /// Submit an answer for a puzzle
    Submit {
        /// Puzzle ID
        #[arg(short = 'i', long)]
        puzzle: u32,

        /// Answer text
        #[arg(short, long)]
        answer: String,

        /// Participant identity (participant scope mode)
        #[arg(short = 'u', long)]
        participant: Option<String>,
    },

    /// Reset a scope to an empty state
    Reset {
        /// Participant identity (participant scope mode)
        #[arg(short = 'u', long)]
        participant: Option<String>,

        /// Required confirmation; progress cannot be recovered
        #[arg(short, long)]
        force: bool,
    },

    /// Validate and print the puzzle catalog
    Catalog,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), VersalError> {
    let ctx = Context {
        database: cli.database,
        backend: cli.backend,
        catalog: cli.catalog,
        scope_mode: parse_scope_mode(&cli.scope_mode)?,
        lock_policy: parse_lock_policy(&cli.lock_policy)?,
        json_mode: cli.json_mode,
        verbose: cli.verbose,
    };

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&ctx, &host, port).await,
        Some(Commands::State { participant }) => cmd_state(&ctx, participant.as_deref()),
        Some(Commands::Submit {
            puzzle,
            answer,
            participant,
        }) => cmd_submit(&ctx, puzzle, &answer, participant.as_deref()),
        Some(Commands::Reset { participant, force }) => {
            cmd_reset(&ctx, participant.as_deref(), force)
        }
        Some(Commands::Catalog) => cmd_catalog(&ctx),
        None => {
            // No subcommand - show the shared state by default
            cmd_state(&ctx, None)
        }
    }
}
