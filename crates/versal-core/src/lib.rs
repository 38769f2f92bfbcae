//! # versal-core
//!
//! The unlock/progress engine for the Versal puzzle hunt - THE LOGIC.
//!
//! Nine puzzles unlock each other along a dependency graph. This crate
//! answers three questions from a set of solved puzzle ids (which puzzles
//! are unlocked, which sets are complete, whether the hunt is over) and
//! applies answer submissions to a versioned state record.
//!
//! ## Layers
//!
//! - `catalog` - immutable puzzle definitions and unlock topology
//! - `unlock` - pure unlock evaluator and tile states
//! - `progress` - set/game completion and grid derivation
//! - `storage` - atomic key-value primitives (in-memory, redb)
//! - `state` - versioned state adapter with optimistic retry
//! - `submission` - answer validation and the solved-puzzle transition
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies
//! - No process-wide game state: every operation reads from and commits to
//!   the store, so several server processes can share one store

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod primitives;
pub mod progress;
pub mod state;
pub mod storage;
pub mod submission;
pub mod types;
pub mod unlock;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    GameState, GridPosition, Hint, Prerequisites, PuzzleDefinition, PuzzleId, Scope, ScopeMode,
    SetId, TileState, VersalError,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use catalog::{Catalog, UnlockTopology};
pub use progress::{completed_sets, grid, is_game_complete, is_set_completed, reachable_sets};
pub use state::{GameStore, Transition};
pub use storage::{KvStore, MemoryStore, RedbStore};
pub use submission::{GameService, LockPolicy, SubmissionResult, answer_matches, normalize_answer};
pub use unlock::{is_unlocked, tile_state, unlocked_puzzles};
