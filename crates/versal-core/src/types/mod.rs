//! # Core Type Definitions
//!
//! This module contains all core types for the Versal puzzle hunt:
//! - Identifiers (`PuzzleId`, `SetId`)
//! - Catalog entries (`PuzzleDefinition`, `Hint`, `Prerequisites`)
//! - Mutable state (`GameState`, `Scope`)
//! - Derived presentation data (`GridPosition`, `TileState`)
//! - Error types (`VersalError`)
//!
//! ## Determinism Guarantees
//!
//! - Identifiers implement `Ord` so every collection is a `BTreeSet`/`BTreeMap`
//! - Serialized state always lists solved puzzles in ascending order

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Catalog identity of a puzzle (1..N).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PuzzleId(pub u32);

impl fmt::Display for PuzzleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a set (path) of puzzles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetId(pub u32);

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CATALOG ENTRIES
// =============================================================================

/// Where a solved puzzle points the players next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    /// Hint text shown after a correct answer.
    pub text: String,
    /// The puzzle the hint leads to, if any.
    #[serde(default)]
    pub target_id: Option<PuzzleId>,
    /// Human label of the hint target (e.g. the board it is posted on).
    pub target_label: String,
}

/// Unlock requirement of a single puzzle.
///
/// The three observed topologies are all expressible here:
/// - linear chain: `All([previous])`
/// - gated tier: `All(previous tier)`
/// - converging capstone: `Any(predecessors)`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerequisites {
    /// Unlocked unconditionally.
    #[default]
    Start,
    /// Every listed puzzle must be solved.
    All(BTreeSet<PuzzleId>),
    /// At least one listed puzzle must be solved.
    Any(BTreeSet<PuzzleId>),
}

impl Prerequisites {
    /// Puzzle ids this requirement refers to.
    pub fn ids(&self) -> impl Iterator<Item = PuzzleId> + '_ {
        let set = match self {
            Self::Start => None,
            Self::All(ids) | Self::Any(ids) => Some(ids),
        };
        set.into_iter().flatten().copied()
    }

    /// Evaluate the requirement against a solved set.
    ///
    /// An empty `All`/`Any` list is treated like `Start`.
    #[must_use]
    pub fn is_satisfied(&self, solved: &BTreeSet<PuzzleId>) -> bool {
        match self {
            Self::Start => true,
            Self::All(ids) => ids.iter().all(|id| solved.contains(id)),
            Self::Any(ids) => ids.is_empty() || ids.iter().any(|id| solved.contains(id)),
        }
    }
}

/// An immutable puzzle definition from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleDefinition {
    pub id: PuzzleId,
    pub title: String,
    /// Where the puzzle is posted.
    pub location: String,
    /// URL of the puzzle's post.
    #[serde(default)]
    pub link: Option<String>,
    /// Canonical answer. Compared after trimming and case folding.
    pub answer: String,
    #[serde(default)]
    pub hint: Option<Hint>,
    pub set_id: SetId,
    /// Presentation slot, independent of `id`.
    pub display_position: u32,
    #[serde(default)]
    pub image_piece: Option<String>,
}

// =============================================================================
// SCOPE
// =============================================================================

/// Unit of state isolation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// One record shared by every participant.
    Global,
    /// One record per participant identity.
    Participant(String),
}

impl Scope {
    /// Key fragment used to namespace store entries.
    #[must_use]
    pub fn key_fragment(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Participant(id) => format!("participant:{id}"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_fragment())
    }
}

/// Deployment mode deciding how a request maps to a [`Scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeMode {
    #[default]
    Global,
    PerParticipant,
}

impl ScopeMode {
    /// Resolve the scope for an optional participant identity.
    ///
    /// Returns `None` in per-participant mode when no identity is known.
    #[must_use]
    pub fn resolve(self, participant: Option<&str>) -> Option<Scope> {
        match self {
            Self::Global => Some(Scope::Global),
            Self::PerParticipant => participant
                .filter(|p| !p.is_empty())
                .map(|p| Scope::Participant(p.to_string())),
        }
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// The authoritative, versioned progress record for one scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub solved_puzzles: BTreeSet<PuzzleId>,
    pub completed_sets: BTreeSet<SetId>,
    /// Always equal to `solved_puzzles.len()`; persisted for readers.
    pub total_solved: usize,
    pub is_complete: bool,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl GameState {
    /// A fresh, empty state. `version` is 0 until the store stamps it.
    #[must_use]
    pub fn new() -> Self {
        Self {
            solved_puzzles: BTreeSet::new(),
            completed_sets: BTreeSet::new(),
            total_solved: 0,
            is_complete: false,
            version: 0,
            last_updated: Utc::now(),
        }
    }

    /// Check whether a puzzle has been solved in this state.
    #[must_use]
    pub fn is_solved(&self, id: PuzzleId) -> bool {
        self.solved_puzzles.contains(&id)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// GRID
// =============================================================================

/// Three-way presentation status of a puzzle tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileState {
    Locked,
    Unlocked,
    Solved,
}

impl fmt::Display for TileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Solved => "solved",
        })
    }
}

/// One display slot of the puzzle grid. Derived per read, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPosition {
    pub position: u32,
    pub puzzle_id: Option<PuzzleId>,
    pub state: TileState,
    pub image_piece: Option<String>,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Versal core.
///
/// Wrong answers and unknown puzzle ids are NOT errors; they are
/// ordinary submission results.
#[derive(Debug, Error)]
pub enum VersalError {
    /// The catalog violates an invariant (duplicate id, cycle, dangling edge).
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    /// The backing store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serializing state for the store failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Concurrent writers kept winning the commit race.
    #[error("Commit conflict after {attempts} attempts")]
    Conflict { attempts: usize },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl VersalError {
    /// Whether the caller may retry the operation unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::Conflict { .. } | Self::Io(_)
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> BTreeSet<PuzzleId> {
        raw.iter().copied().map(PuzzleId).collect()
    }

    #[test]
    fn prerequisites_all_requires_every_member() {
        let rule = Prerequisites::All(ids(&[1, 2]));
        assert!(!rule.is_satisfied(&ids(&[1])));
        assert!(rule.is_satisfied(&ids(&[1, 2, 5])));
    }

    #[test]
    fn prerequisites_any_requires_one_member() {
        let rule = Prerequisites::Any(ids(&[5, 6]));
        assert!(!rule.is_satisfied(&ids(&[])));
        assert!(rule.is_satisfied(&ids(&[6])));
    }

    #[test]
    fn empty_lists_behave_like_start() {
        assert!(Prerequisites::All(BTreeSet::new()).is_satisfied(&ids(&[])));
        assert!(Prerequisites::Any(BTreeSet::new()).is_satisfied(&ids(&[])));
    }

    #[test]
    fn scope_mode_resolution() {
        assert_eq!(ScopeMode::Global.resolve(None), Some(Scope::Global));
        assert_eq!(ScopeMode::PerParticipant.resolve(None), None);
        assert_eq!(ScopeMode::PerParticipant.resolve(Some("")), None);
        assert_eq!(
            ScopeMode::PerParticipant.resolve(Some("alice")),
            Some(Scope::Participant("alice".to_string()))
        );
    }

    #[test]
    fn game_state_serializes_camel_case() {
        let mut state = GameState::new();
        state.solved_puzzles.insert(PuzzleId(3));
        state.solved_puzzles.insert(PuzzleId(1));
        let json = serde_json::to_string(&state).expect("serialize");
        assert!(json.contains("\"solvedPuzzles\":[1,3]"));
        assert!(json.contains("\"isComplete\":false"));
        assert!(json.contains("\"lastUpdated\""));
    }

    #[test]
    fn retryable_classification() {
        assert!(VersalError::Storage("down".into()).is_retryable());
        assert!(VersalError::Conflict { attempts: 3 }.is_retryable());
        assert!(!VersalError::InvalidCatalog("cycle".into()).is_retryable());
        assert!(!VersalError::Serialization("bad".into()).is_retryable());
    }
}
