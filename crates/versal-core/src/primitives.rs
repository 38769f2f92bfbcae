//! # Primitives
//!
//! Fixed runtime constants for the Versal core.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Namespace prefix for every key the core writes to a shared store.
pub const KEY_NAMESPACE: &str = "versal";

/// Key segment for the serialized `GameState` blob.
pub const STATE_KEY_SEGMENT: &str = "game_state";

/// Key segment for the atomic version counter.
pub const VERSION_KEY_SEGMENT: &str = "game_version";

// =============================================================================
// INPUT LIMITS
// =============================================================================

/// Maximum number of characters of a submitted answer that are compared.
///
/// Longer input is truncated before comparison, correct or not.
pub const MAX_ANSWER_LENGTH: usize = 100;

/// Characters stripped from every submitted answer.
pub const STRIPPED_ANSWER_CHARS: [char; 2] = ['<', '>'];

/// Maximum length of a participant identity used in store keys.
pub const MAX_PARTICIPANT_ID_LENGTH: usize = 128;

// =============================================================================
// CONCURRENCY
// =============================================================================

/// How many times a commit is re-derived after losing a race before
/// surfacing `VersalError::Conflict`.
pub const MAX_COMMIT_ATTEMPTS: usize = 3;

// =============================================================================
// CATALOG
// =============================================================================

/// Number of display slots in the default grid (3x3).
pub const DEFAULT_GRID_SIZE: u32 = 9;
