//! # Game State Store Adapter
//!
//! Loads and commits the versioned `GameState` of a scope through a
//! [`KvStore`].
//!
//! ## Persisted layout
//!
//! - `versal:game_state:{scope}` → JSON `GameState`
//! - `versal:game_version:{scope}` → integer counter
//!
//! ## Concurrency
//!
//! Optimistic retry. A commit reads the raw blob, derives the next state,
//! takes the next version from the atomic counter and installs the blob with
//! `compare_and_set` against what it read. A lost race re-derives from a
//! fresh read, up to `MAX_COMMIT_ATTEMPTS`. Counter values consumed by a
//! lost attempt are skipped, so versions may have gaps but never repeat.
//!
//! ## Failure semantics
//!
//! - Store I/O errors propagate (retryable)
//! - A malformed blob is logged and treated as "no state"

use crate::catalog::Catalog;
use crate::primitives::{KEY_NAMESPACE, MAX_COMMIT_ATTEMPTS, STATE_KEY_SEGMENT, VERSION_KEY_SEGMENT};
use crate::storage::KvStore;
use crate::{GameState, PuzzleId, Scope, VersalError};
use chrono::Utc;
use std::sync::Arc;

/// Result of a solved-puzzle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// State before the transition (as read for the winning attempt).
    pub previous: GameState,
    /// State after the transition.
    pub current: GameState,
    /// `false` if the puzzle was already solved and nothing was written.
    pub applied: bool,
}

/// The Store Adapter.
#[derive(Clone)]
pub struct GameStore {
    store: Arc<dyn KvStore>,
    catalog: Arc<Catalog>,
}

impl std::fmt::Debug for GameStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameStore")
            .field("puzzles", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl GameStore {
    /// Create an adapter over a backing store.
    #[must_use]
    pub fn new(store: Arc<dyn KvStore>, catalog: Arc<Catalog>) -> Self {
        Self { store, catalog }
    }

    /// The catalog used to recompute derived fields.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Store key of the state blob for a scope.
    #[must_use]
    pub fn state_key(scope: &Scope) -> String {
        format!("{KEY_NAMESPACE}:{STATE_KEY_SEGMENT}:{}", scope.key_fragment())
    }

    /// Store key of the version counter for a scope.
    #[must_use]
    pub fn version_key(scope: &Scope) -> String {
        format!("{KEY_NAMESPACE}:{VERSION_KEY_SEGMENT}:{}", scope.key_fragment())
    }

    /// Return the state of `scope`, creating a default record on first access.
    pub fn load(&self, scope: &Scope) -> Result<GameState, VersalError> {
        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let (raw, parsed) = self.read(scope)?;
            if let Some(state) = parsed {
                return Ok(state);
            }
            if let Some(state) = self.try_commit(scope, raw.as_deref(), GameState::new())? {
                tracing::info!(scope = %scope, version = state.version, "Initialized game state");
                return Ok(state);
            }
            tracing::debug!(scope = %scope, "Lost initialization race, re-reading");
        }
        Err(VersalError::Conflict {
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    /// Add `puzzle` to the solved set of `scope`.
    ///
    /// Already-solved puzzles are a no-op: nothing is written and the
    /// version is not bumped.
    pub fn mark_solved(&self, scope: &Scope, puzzle: PuzzleId) -> Result<Transition, VersalError> {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let (raw, parsed) = self.read(scope)?;
            let previous = match parsed {
                Some(state) => state,
                None => {
                    // Absent or corrupt: install a default first so the
                    // transition starts from a stamped record.
                    self.load(scope)?;
                    continue;
                }
            };

            if previous.is_solved(puzzle) {
                return Ok(Transition {
                    current: previous.clone(),
                    previous,
                    applied: false,
                });
            }

            let mut next = previous.clone();
            next.solved_puzzles.insert(puzzle);
            next.recompute(&self.catalog);

            if let Some(current) = self.try_commit(scope, raw.as_deref(), next)? {
                tracing::info!(
                    scope = %scope,
                    puzzle = puzzle.0,
                    version = current.version,
                    total_solved = current.total_solved,
                    "Puzzle solved"
                );
                return Ok(Transition {
                    previous,
                    current,
                    applied: true,
                });
            }
            tracing::warn!(scope = %scope, attempt, "Commit conflict, retrying");
        }
        Err(VersalError::Conflict {
            attempts: MAX_COMMIT_ATTEMPTS,
        })
    }

    /// Persist `state` for `scope` unconditionally.
    ///
    /// Bumps the version counter and stamps `last_updated`. Last write wins;
    /// the solve path uses `mark_solved` instead.
    pub fn save(&self, scope: &Scope, mut state: GameState) -> Result<GameState, VersalError> {
        state.recompute(&self.catalog);
        self.stamp(scope, &mut state)?;
        let blob = encode(&state)?;
        self.store.set(&Self::state_key(scope), &blob)?;
        Ok(state)
    }

    /// Delete the state and counter of `scope` and reinitialize it.
    ///
    /// A subsequent `load` observes version 1.
    pub fn reset(&self, scope: &Scope) -> Result<GameState, VersalError> {
        self.store.delete(&Self::state_key(scope))?;
        self.store.delete(&Self::version_key(scope))?;
        tracing::info!(scope = %scope, "Game state reset");
        self.load(scope)
    }

    /// Read the raw blob and its parsed form (`None` when absent or corrupt).
    fn read(&self, scope: &Scope) -> Result<(Option<String>, Option<GameState>), VersalError> {
        let raw = self.store.get(&Self::state_key(scope))?;
        let parsed = match raw.as_deref() {
            None => None,
            Some(blob) => match serde_json::from_str::<GameState>(blob) {
                Ok(mut state) => {
                    self.sanitize(&mut state);
                    Some(state)
                }
                Err(e) => {
                    tracing::warn!(scope = %scope, error = %e, "Discarding malformed game state");
                    None
                }
            },
        };
        Ok((raw, parsed))
    }

    /// Drop ids the catalog does not know and refresh derived fields.
    fn sanitize(&self, state: &mut GameState) {
        let before = state.solved_puzzles.len();
        state.solved_puzzles.retain(|id| self.catalog.contains(*id));
        if state.solved_puzzles.len() != before {
            tracing::warn!(
                dropped = before - state.solved_puzzles.len(),
                "Stored state referenced puzzles outside the catalog"
            );
        }
        state.recompute(&self.catalog);
    }

    fn stamp(&self, scope: &Scope, state: &mut GameState) -> Result<(), VersalError> {
        state.version = self.store.incr(&Self::version_key(scope))?;
        state.last_updated = Utc::now();
        Ok(())
    }

    /// Stamp and install `state` if the blob still equals `expected`.
    fn try_commit(
        &self,
        scope: &Scope,
        expected: Option<&str>,
        mut state: GameState,
    ) -> Result<Option<GameState>, VersalError> {
        self.stamp(scope, &mut state)?;
        let blob = encode(&state)?;
        if self
            .store
            .compare_and_set(&Self::state_key(scope), expected, &blob)?
        {
            Ok(Some(state))
        } else {
            Ok(None)
        }
    }
}

fn encode(state: &GameState) -> Result<String, VersalError> {
    serde_json::to_string(state).map_err(|e| VersalError::Serialization(e.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
