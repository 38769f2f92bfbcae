//! # API Request/Response Types
//!
//! JSON structures for the HTTP API. Field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use versal_core::{
    Catalog, GameState, GridPosition, Hint, PuzzleDefinition, PuzzleId, SetId,
};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// GAME STATE RESPONSE
// =============================================================================

/// Persisted state plus the derived display grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateResponse {
    #[serde(flatten)]
    pub state: GameState,
    pub grid: Vec<GridPosition>,
}

// =============================================================================
// SUBMIT ANSWER REQUEST
// =============================================================================

/// Answer submission body. Both fields are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAnswerRequest {
    #[serde(default)]
    pub puzzle_id: Option<u32>,
    #[serde(default)]
    pub answer: Option<String>,
}

impl SubmitAnswerRequest {
    /// Check the request shape and return the puzzle id and raw answer.
    ///
    /// Only shape is checked here. Whether the id exists in the catalog is
    /// the submission service's call, and a blank but present answer is
    /// judged like any other wrong answer.
    pub fn validate(&self) -> Result<(PuzzleId, &str), &'static str> {
        let puzzle_id = match self.puzzle_id {
            Some(id) if id > 0 => PuzzleId(id),
            _ => return Err("Puzzle ID and answer are required"),
        };
        match self.answer.as_deref() {
            Some(answer) if !answer.is_empty() => Ok((puzzle_id, answer)),
            _ => Err("Puzzle ID and answer are required"),
        }
    }
}

// =============================================================================
// RESET RESPONSE
// =============================================================================

/// Reset response carrying the freshly initialized state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub success: bool,
    pub game_state: GameState,
}

// =============================================================================
// PUZZLE DATA RESPONSE
// =============================================================================

/// Public view of a puzzle. The canonical answer is never exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleJson {
    pub id: PuzzleId,
    pub title: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub set_id: SetId,
    pub display_position: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_piece: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<Hint>,
}

impl From<&PuzzleDefinition> for PuzzleJson {
    fn from(puzzle: &PuzzleDefinition) -> Self {
        Self {
            id: puzzle.id,
            title: puzzle.title.clone(),
            location: puzzle.location.clone(),
            link: puzzle.link.clone(),
            set_id: puzzle.set_id,
            display_position: puzzle.display_position,
            image_piece: puzzle.image_piece.clone(),
            hint: puzzle.hint.clone(),
        }
    }
}

/// Static catalog view for clients that render the grid themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzleDataResponse {
    pub puzzles: Vec<PuzzleJson>,
    /// Slot layout as seen before anything is solved.
    pub grid_mapping: Vec<GridPosition>,
    /// Set id to member puzzle ids.
    pub set_configuration: BTreeMap<SetId, Vec<PuzzleId>>,
}

impl PuzzleDataResponse {
    /// Build the public catalog view.
    #[must_use]
    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self {
            puzzles: catalog.puzzles().map(PuzzleJson::from).collect(),
            grid_mapping: versal_core::grid(catalog, &BTreeSet::new()),
            set_configuration: catalog
                .sets()
                .map(|(set, members)| (set, members.iter().copied().collect()))
                .collect(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Machine-readable error detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

/// Error envelope for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    /// Build an envelope stamped with the current time.
    #[must_use]
    pub fn new(code: &str, message: &str, retryable: bool) -> Self {
        Self {
            success: false,
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
                retryable,
            },
            timestamp: Utc::now(),
        }
    }
}
