//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use versal_core::{
    Catalog, GameService, GameState, GameStore, GridPosition, KvStore, LockPolicy, MemoryStore,
    Prerequisites, PuzzleId, RedbStore, Scope, ScopeMode, TileState, VersalError, grid,
    unlocked_puzzles,
};

// =============================================================================
// CONTEXT
// =============================================================================

/// Global flags shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub database: PathBuf,
    pub backend: String,
    pub catalog: Option<PathBuf>,
    pub scope_mode: ScopeMode,
    pub lock_policy: LockPolicy,
    pub json_mode: bool,
    pub verbose: bool,
}

/// Parse the `--scope-mode` flag.
pub fn parse_scope_mode(value: &str) -> Result<ScopeMode, VersalError> {
    match value {
        "global" => Ok(ScopeMode::Global),
        "participant" | "per-participant" => Ok(ScopeMode::PerParticipant),
        other => Err(VersalError::Io(format!(
            "Unknown scope mode '{}' (expected global or participant)",
            other
        ))),
    }
}

/// Parse the `--lock-policy` flag.
pub fn parse_lock_policy(value: &str) -> Result<LockPolicy, VersalError> {
    match value {
        "ignore" => Ok(LockPolicy::Ignore),
        "enforce" => Ok(LockPolicy::Enforce),
        other => Err(VersalError::Io(format!(
            "Unknown lock policy '{}' (expected ignore or enforce)",
            other
        ))),
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(ctx: &Context, host: &str, port: u16) -> Result<(), VersalError> {
    let service = build_service(ctx)?;

    println!("Versal Puzzle Hunt Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:        {}", host);
    println!("  Port:        {}", port);
    println!("  Backend:     {}", ctx.backend);
    println!("  Database:    {:?}", ctx.database);
    println!("  Scope mode:  {:?}", ctx.scope_mode);
    println!("  Lock policy: {:?}", ctx.lock_policy);
    println!("  Puzzles:     {}", service.catalog().len());
    println!();
    println!("Endpoints:");
    println!("  GET  /api/game-state    - Current state and grid");
    println!("  POST /api/submit-answer - Submit an answer");
    println!("  POST /api/reset-game    - Reset progress (VERSAL_ALLOW_RESET=1)");
    println!("  GET  /api/puzzles       - Puzzle catalog");
    println!("  GET  /health            - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let state = api::AppState::new(service, ctx.scope_mode);
    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, state).await
}

// =============================================================================
// STATE COMMAND
// =============================================================================

/// Show the game state and grid for a scope.
pub fn cmd_state(ctx: &Context, participant: Option<&str>) -> Result<(), VersalError> {
    let service = build_service(ctx)?;
    let scope = resolve_scope(ctx, participant)?;
    let state = service.state(&scope)?;
    let cells = grid(service.catalog(), &state.solved_puzzles);
    let open = open_puzzles(service.catalog(), &state);

    if ctx.json_mode {
        let output = serde_json::json!({
            "scope": scope.to_string(),
            "state": state,
            "open": open,
            "grid": cells,
        });
        print_json(&output)?;
    } else {
        println!("Scope: {}", scope);
        print_state(&state);
        let open: Vec<String> = open.iter().map(|id| id.to_string()).collect();
        println!("Open:           [{}]", open.join(", "));
        println!();
        print_grid(&cells, service.catalog().grid_size());
    }
    Ok(())
}

// =============================================================================
// SUBMIT COMMAND
// =============================================================================

/// Submit an answer for a puzzle.
pub fn cmd_submit(
    ctx: &Context,
    puzzle: u32,
    answer: &str,
    participant: Option<&str>,
) -> Result<(), VersalError> {
    let service = build_service(ctx)?;
    let scope = resolve_scope(ctx, participant)?;
    let result = service.submit(&scope, PuzzleId(puzzle), answer)?;

    if ctx.json_mode {
        return print_json(&result);
    }

    if !result.success {
        println!(
            "Puzzle {}: {}",
            puzzle,
            result.error.as_deref().unwrap_or("rejected")
        );
        return Ok(());
    }

    if result.already_solved {
        println!("Puzzle {} was already solved.", puzzle);
    } else {
        println!("Puzzle {} solved!", puzzle);
    }
    if let Some(hint) = &result.hint {
        match &result.target_label {
            Some(label) => println!("  Hint: {} ({})", hint, label),
            None => println!("  Hint: {}", hint),
        }
    }
    if result.set_completed {
        println!("  Set complete.");
    }
    if let Some(set) = result.new_set_unlocked {
        println!("  New set reachable: {}", set);
    }
    if result.is_game_complete {
        println!("  The hunt is complete!");
    }
    if let Some(state) = &result.state {
        println!();
        print_state(state);
    }
    Ok(())
}

// =============================================================================
// RESET COMMAND
// =============================================================================

/// Reset a scope to an empty state. Requires `--force`.
pub fn cmd_reset(ctx: &Context, participant: Option<&str>, force: bool) -> Result<(), VersalError> {
    if !force {
        return Err(VersalError::Io(
            "Reset discards all progress for the scope. Use --force to confirm.".to_string(),
        ));
    }

    let service = build_service(ctx)?;
    let scope = resolve_scope(ctx, participant)?;
    let state = service.reset(&scope)?;
    tracing::warn!(scope = %scope, "Game state reset from CLI");

    if ctx.json_mode {
        print_json(&serde_json::json!({ "success": true, "gameState": state }))
    } else {
        println!("Scope {} reset (version {}).", scope, state.version);
        Ok(())
    }
}

// =============================================================================
// CATALOG COMMAND
// =============================================================================

/// Validate and print the puzzle catalog.
pub fn cmd_catalog(ctx: &Context) -> Result<(), VersalError> {
    let catalog = load_catalog(ctx.catalog.as_deref())?;

    if ctx.json_mode {
        let output = api::PuzzleDataResponse::from_catalog(&catalog);
        return print_json(&output);
    }

    println!(
        "Catalog OK: {} puzzles, {} sets, grid of {}",
        catalog.len(),
        catalog.sets().count(),
        catalog.grid_size()
    );
    println!();
    for puzzle in catalog.puzzles() {
        println!(
            "  #{:<3} {:<20} {:<16} set {}  slot {}",
            puzzle.id.0, puzzle.title, puzzle.location, puzzle.set_id, puzzle.display_position
        );
        if ctx.verbose {
            println!(
                "        unlock: {}",
                describe_rule(catalog.topology().prerequisites(puzzle.id))
            );
            if let Some(link) = &puzzle.link {
                println!("        link:   {}", link);
            }
            if let Some(hint) = &puzzle.hint {
                println!("        hint:   {} -> {}", hint.text, hint.target_label);
            }
        }
    }
    Ok(())
}

fn describe_rule(rule: &Prerequisites) -> String {
    let join = |ids: &std::collections::BTreeSet<PuzzleId>, sep: &str| {
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(sep)
    };
    match rule {
        Prerequisites::Start => "start".to_string(),
        Prerequisites::All(ids) => format!("all of [{}]", join(ids, ", ")),
        Prerequisites::Any(ids) => format!("any of [{}]", join(ids, ", ")),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Load the catalog from a TOML file, or the built-in hunt.
pub fn load_catalog(path: Option<&Path>) -> Result<Catalog, VersalError> {
    match path {
        Some(path) => Catalog::load(path),
        None => Ok(Catalog::builtin()),
    }
}

/// Open the configured storage backend.
pub fn open_store(db_path: &Path, backend: &str) -> Result<Arc<dyn KvStore>, VersalError> {
    match backend {
        "redb" => Ok(Arc::new(RedbStore::open(db_path)?)),
        "memory" => {
            tracing::warn!("Memory backend selected: progress is lost when the process exits");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => Err(VersalError::Io(format!(
            "Unknown backend '{}' (expected redb or memory)",
            other
        ))),
    }
}

/// Wire catalog, store and lock policy into a submission service.
pub fn build_service(ctx: &Context) -> Result<GameService, VersalError> {
    let catalog = load_catalog(ctx.catalog.as_deref())?;
    let store = open_store(&ctx.database, &ctx.backend)?;
    Ok(GameService::new(GameStore::new(store, Arc::new(catalog))).with_lock_policy(ctx.lock_policy))
}

fn resolve_scope(ctx: &Context, participant: Option<&str>) -> Result<Scope, VersalError> {
    ctx.scope_mode.resolve(participant).ok_or_else(|| {
        VersalError::Io("Participant scope mode requires --participant <id>".to_string())
    })
}

/// Puzzles that can be attempted now: unlocked and not yet solved.
fn open_puzzles(catalog: &Catalog, state: &GameState) -> Vec<PuzzleId> {
    unlocked_puzzles(catalog, &state.solved_puzzles)
        .into_iter()
        .filter(|id| !state.is_solved(*id))
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), VersalError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| VersalError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn print_state(state: &GameState) {
    let solved: Vec<String> = state.solved_puzzles.iter().map(|id| id.to_string()).collect();
    let sets: Vec<String> = state.completed_sets.iter().map(|id| id.to_string()).collect();
    println!("Solved:         {} [{}]", state.total_solved, solved.join(", "));
    println!("Completed sets: [{}]", sets.join(", "));
    println!("Complete:       {}", state.is_complete);
    println!("Version:        {}", state.version);
    println!("Last updated:   {}", state.last_updated.to_rfc3339());
}

/// Render the grid as rows of a square board.
fn print_grid(cells: &[GridPosition], grid_size: u32) {
    let mut width = 1u32;
    while width * width < grid_size {
        width += 1;
    }

    for row in cells.chunks(width as usize) {
        let line: Vec<String> = row
            .iter()
            .map(|cell| match (cell.puzzle_id, cell.state) {
                (None, _) => "  .  ".to_string(),
                (Some(id), TileState::Solved) => format!("[{:^3}]", id.0),
                (Some(id), TileState::Unlocked) => format!(" {:^3} ", id.0),
                (Some(_), TileState::Locked) => "  #  ".to_string(),
            })
            .collect();
        println!("  {}", line.join(" "));
    }
}

// =============================================================================
// TESTS
// =============================================================================
