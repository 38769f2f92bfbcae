//! # Progress Aggregator
//!
//! Derives set completion, game completion and the display grid from a
//! solved set. Every function here is total and side-effect free.

use crate::catalog::Catalog;
use crate::unlock::{is_unlocked, tile_state};
use crate::{GameState, GridPosition, PuzzleId, SetId, TileState};
use std::collections::BTreeSet;

/// Whether every member of `set` is solved. Unknown sets are never complete.
#[must_use]
pub fn is_set_completed(catalog: &Catalog, set: SetId, solved: &BTreeSet<PuzzleId>) -> bool {
    catalog
        .set_members(set)
        .is_some_and(|members| members.is_subset(solved))
}

/// All sets whose members are all solved.
#[must_use]
pub fn completed_sets(catalog: &Catalog, solved: &BTreeSet<PuzzleId>) -> BTreeSet<SetId> {
    catalog
        .sets()
        .filter(|(_, members)| members.is_subset(solved))
        .map(|(id, _)| id)
        .collect()
}

/// Whether every catalog puzzle is solved.
///
/// Ids outside the catalog do not count towards completion.
#[must_use]
pub fn is_game_complete(catalog: &Catalog, solved: &BTreeSet<PuzzleId>) -> bool {
    solved.iter().filter(|id| catalog.contains(**id)).count() == catalog.len()
}

/// Sets that have at least one unlocked or solved member.
#[must_use]
pub fn reachable_sets(catalog: &Catalog, solved: &BTreeSet<PuzzleId>) -> BTreeSet<SetId> {
    catalog
        .sets()
        .filter(|(_, members)| {
            members
                .iter()
                .any(|id| solved.contains(id) || is_unlocked(catalog, *id, solved))
        })
        .map(|(id, _)| id)
        .collect()
}

/// One `GridPosition` per display slot, in slot order.
///
/// Slots with no puzzle are reported locked with no puzzle id.
#[must_use]
pub fn grid(catalog: &Catalog, solved: &BTreeSet<PuzzleId>) -> Vec<GridPosition> {
    (1..=catalog.grid_size())
        .map(|position| match catalog.puzzle_at(position) {
            Some(puzzle) => GridPosition {
                position,
                puzzle_id: Some(puzzle.id),
                state: tile_state(catalog, puzzle.id, solved),
                image_piece: puzzle.image_piece.clone(),
            },
            None => GridPosition {
                position,
                puzzle_id: None,
                state: TileState::Locked,
                image_piece: None,
            },
        })
        .collect()
}

impl GameState {
    /// Refresh every derived field from `solved_puzzles`.
    ///
    /// `is_complete` is sticky: once set it stays set until a reset.
    pub fn recompute(&mut self, catalog: &Catalog) {
        self.total_solved = self.solved_puzzles.len();
        self.completed_sets = completed_sets(catalog, &self.solved_puzzles);
        self.is_complete = self.is_complete || is_game_complete(catalog, &self.solved_puzzles);
    }
}

// =============================================================================
// TESTS
// =============================================================================
