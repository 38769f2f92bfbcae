//! # Answer Submission Service
//!
//! Validates a submitted answer against the catalog and applies the
//! solved-puzzle transition through the [`GameStore`].
//!
//! Submission state machine:
//! 1. unknown puzzle → `invalid puzzle`, no mutation
//! 2. answer normalization (always)
//! 3. wrong answer → `incorrect answer`, no mutation
//! 4. locked puzzle under `LockPolicy::Enforce` → `puzzle locked`, no mutation
//! 5. already solved → success, current state, version untouched
//! 6. newly solved → transition committed, hint and progress flags reported

use crate::catalog::Catalog;
use crate::primitives::{MAX_ANSWER_LENGTH, STRIPPED_ANSWER_CHARS};
use crate::progress::reachable_sets;
use crate::state::GameStore;
use crate::unlock::is_unlocked;
use crate::{GameState, PuzzleId, Scope, SetId, VersalError};
use serde::{Deserialize, Serialize};

/// Error message for unknown puzzle ids.
pub const ERR_INVALID_PUZZLE: &str = "invalid puzzle";
/// Error message for wrong answers.
pub const ERR_INCORRECT_ANSWER: &str = "incorrect answer";
/// Error message for answers to locked puzzles under `LockPolicy::Enforce`.
pub const ERR_PUZZLE_LOCKED: &str = "puzzle locked";

/// What to do with a correct answer for a puzzle that is still locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// Validate correctness only; lock gating is left to the caller.
    #[default]
    Ignore,
    /// Reject submissions for locked puzzles.
    Enforce,
}

/// Outcome of one submission. Failures here are ordinary results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub success: bool,
    pub puzzle_id: PuzzleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<PuzzleId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub already_solved: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub set_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_set_unlocked: Option<SetId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_game_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<GameState>,
}

impl SubmissionResult {
    /// A rejected submission with a user-facing message.
    #[must_use]
    pub fn rejected(puzzle_id: PuzzleId, error: &str) -> Self {
        Self {
            success: false,
            puzzle_id,
            hint: None,
            target_label: None,
            target_id: None,
            already_solved: false,
            set_completed: false,
            new_set_unlocked: None,
            is_game_complete: false,
            error: Some(error.to_string()),
            state: None,
        }
    }

    fn accepted(puzzle_id: PuzzleId, state: GameState) -> Self {
        Self {
            success: true,
            error: None,
            is_game_complete: state.is_complete,
            state: Some(state),
            ..Self::rejected(puzzle_id, "")
        }
    }
}

/// Normalize a raw submission: trim, strip markup characters, cap the
/// length and fold case.
///
/// Stripping removes `<` and `>` only, so `"<script>3</script>"`
/// normalizes to `"script3/script"`, which never equals `"3"`.
#[must_use]
pub fn normalize_answer(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !STRIPPED_ANSWER_CHARS.contains(c))
        .take(MAX_ANSWER_LENGTH)
        .collect::<String>()
        .to_lowercase()
}

/// Compare a raw submission against a canonical answer.
#[must_use]
pub fn answer_matches(raw: &str, canonical: &str) -> bool {
    normalize_answer(raw) == canonical.trim().to_lowercase()
}

/// The Answer Submission Service.
#[derive(Debug, Clone)]
pub struct GameService {
    store: GameStore,
    lock_policy: LockPolicy,
}

impl GameService {
    /// Create a service with the default lock policy.
    #[must_use]
    pub fn new(store: GameStore) -> Self {
        Self {
            store,
            lock_policy: LockPolicy::default(),
        }
    }

    /// Override the lock policy.
    #[must_use]
    pub fn with_lock_policy(mut self, lock_policy: LockPolicy) -> Self {
        self.lock_policy = lock_policy;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        self.store.catalog()
    }

    #[must_use]
    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    /// Current state of a scope (initialized on first access).
    pub fn state(&self, scope: &Scope) -> Result<GameState, VersalError> {
        self.store.load(scope)
    }

    /// Clear a scope back to an empty, version-1 state.
    pub fn reset(&self, scope: &Scope) -> Result<GameState, VersalError> {
        self.store.reset(scope)
    }

    /// Validate and apply an answer submission.
    pub fn submit(
        &self,
        scope: &Scope,
        puzzle_id: PuzzleId,
        raw_answer: &str,
    ) -> Result<SubmissionResult, VersalError> {
        let catalog = self.store.catalog();
        let Some(puzzle) = catalog.puzzle(puzzle_id) else {
            tracing::debug!(scope = %scope, puzzle = puzzle_id.0, "Submission for unknown puzzle");
            return Ok(SubmissionResult::rejected(puzzle_id, ERR_INVALID_PUZZLE));
        };

        if !answer_matches(raw_answer, &puzzle.answer) {
            tracing::debug!(scope = %scope, puzzle = puzzle_id.0, "Incorrect answer");
            return Ok(SubmissionResult::rejected(puzzle_id, ERR_INCORRECT_ANSWER));
        }

        if self.lock_policy == LockPolicy::Enforce {
            let state = self.store.load(scope)?;
            if !state.is_solved(puzzle_id)
                && !is_unlocked(catalog, puzzle_id, &state.solved_puzzles)
            {
                tracing::debug!(scope = %scope, puzzle = puzzle_id.0, "Answer for locked puzzle");
                return Ok(SubmissionResult::rejected(puzzle_id, ERR_PUZZLE_LOCKED));
            }
        }

        let transition = self.store.mark_solved(scope, puzzle_id)?;
        if !transition.applied {
            let mut result = SubmissionResult::accepted(puzzle_id, transition.current);
            result.already_solved = true;
            return Ok(result);
        }

        let previous = &transition.previous;
        let current = &transition.current;

        let set_completed = current.completed_sets.contains(&puzzle.set_id)
            && !previous.completed_sets.contains(&puzzle.set_id);
        let reachable_before = reachable_sets(catalog, &previous.solved_puzzles);
        let new_set_unlocked = reachable_sets(catalog, &current.solved_puzzles)
            .difference(&reachable_before)
            .next()
            .copied();

        let mut result = SubmissionResult::accepted(puzzle_id, transition.current.clone());
        result.set_completed = set_completed;
        result.new_set_unlocked = new_set_unlocked;
        if let Some(hint) = &puzzle.hint {
            result.hint = Some(hint.text.clone());
            result.target_label = Some(hint.target_label.clone());
            result.target_id = hint.target_id;
        }
        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================
