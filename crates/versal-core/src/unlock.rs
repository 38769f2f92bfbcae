//! # Unlock Rule Evaluator
//!
//! Pure functions over an immutable `Catalog` and a solved set.
//!
//! - Unknown puzzle ids are never unlocked (no error)
//! - Tile state checks "solved" before "unlocked"
//! - No side effects; safe to call from any number of threads

use crate::catalog::Catalog;
use crate::{PuzzleId, TileState};
use std::collections::BTreeSet;

/// Whether a puzzle's prerequisites are met by `solved`.
#[must_use]
pub fn is_unlocked(catalog: &Catalog, puzzle: PuzzleId, solved: &BTreeSet<PuzzleId>) -> bool {
    if !catalog.contains(puzzle) {
        return false;
    }
    catalog.topology().prerequisites(puzzle).is_satisfied(solved)
}

/// Three-way tile status of a puzzle.
#[must_use]
pub fn tile_state(catalog: &Catalog, puzzle: PuzzleId, solved: &BTreeSet<PuzzleId>) -> TileState {
    if solved.contains(&puzzle) {
        TileState::Solved
    } else if is_unlocked(catalog, puzzle, solved) {
        TileState::Unlocked
    } else {
        TileState::Locked
    }
}

/// Every catalog puzzle whose prerequisites are met, solved or not.
#[must_use]
pub fn unlocked_puzzles(catalog: &Catalog, solved: &BTreeSet<PuzzleId>) -> BTreeSet<PuzzleId> {
    catalog
        .puzzles()
        .map(|p| p.id)
        .filter(|id| is_unlocked(catalog, *id, solved))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
