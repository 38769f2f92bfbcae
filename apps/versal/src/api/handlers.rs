//! # API Endpoint Handlers
//!
//! This module implements the HTTP endpoint handlers and the mapping from
//! core errors to the JSON error envelope.

use super::{
    AppState,
    middleware::too_many_requests,
    types::{
        ErrorResponse, GameStateResponse, HealthResponse, PuzzleDataResponse, ResetResponse,
        SubmitAnswerRequest,
    },
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use versal_core::{Scope, VersalError, grid, primitives::MAX_PARTICIPANT_ID_LENGTH};

/// Header carrying the host-provided participant identity.
pub const PARTICIPANT_HEADER: &str = "x-participant-id";

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// An error rendered as the JSON error envelope.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl ApiError {
    /// 400 for malformed request bodies or headers.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_INPUT",
            message: message.into(),
            retryable: false,
        }
    }

    /// 401 when no participant identity is available.
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "AUTH_ERROR",
            message: "User not authenticated".to_string(),
            retryable: false,
        }
    }

    /// 403 when the reset route is switched off.
    pub fn reset_disabled() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "RESET_DISABLED",
            message: "Game reset is disabled on this server".to_string(),
            retryable: false,
        }
    }
}

impl From<VersalError> for ApiError {
    fn from(e: VersalError) -> Self {
        // Detail stays in the log; clients only see a generic message.
        tracing::error!(error = %e, retryable = e.is_retryable(), "Game store operation failed");
        if e.is_retryable() {
            Self {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "STORE_UNAVAILABLE",
                message: "Game state is temporarily unavailable, please retry".to_string(),
                retryable: true,
            }
        } else {
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "INTERNAL_ERROR",
                message: "Internal server error".to_string(),
                retryable: false,
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse::new(self.code, &self.message, self.retryable)),
        )
            .into_response()
    }
}

// =============================================================================
// SCOPE RESOLUTION
// =============================================================================

/// Read the participant identity header, if any.
///
/// An empty or whitespace-only value counts as absent.
fn participant_id(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(PARTICIPANT_HEADER) else {
        return Ok(None);
    };
    let id = value
        .to_str()
        .map_err(|_| ApiError::invalid_input("Participant id must be visible ASCII"))?
        .trim();
    if id.len() > MAX_PARTICIPANT_ID_LENGTH {
        return Err(ApiError::invalid_input(format!(
            "Participant id exceeds {} bytes",
            MAX_PARTICIPANT_ID_LENGTH
        )));
    }
    Ok((!id.is_empty()).then_some(id))
}

/// Resolve the request's scope from the participant header and scope mode.
fn resolve_scope(state: &AppState, headers: &HeaderMap) -> Result<Scope, ApiError> {
    state
        .scope_mode
        .resolve(participant_id(headers)?)
        .ok_or_else(ApiError::unauthenticated)
}

/// Key for the submission limiter.
///
/// Attempts are budgeted per participant even when progress is shared, so
/// the identity wins over the scope whenever one is present.
fn submit_limit_key(participant: Option<&str>, scope: &Scope) -> String {
    match participant {
        Some(id) => Scope::Participant(id.to_string()).key_fragment(),
        None => scope.key_fragment(),
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// GAME STATE HANDLER
// =============================================================================

/// Current state for the caller's scope, initializing it on first access.
pub async fn game_state_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GameStateResponse>, ApiError> {
    let scope = resolve_scope(&state, &headers)?;
    let game = state.service.state(&scope)?;
    let grid = grid(state.service.catalog(), &game.solved_puzzles);
    Ok(Json(GameStateResponse { state: game, grid }))
}

// =============================================================================
// SUBMIT ANSWER HANDLER
// =============================================================================

/// Validate and apply an answer submission.
///
/// Wrong answers and unknown puzzles are 200 responses with
/// `success: false`; only request-shape, identity, rate-limit and storage
/// failures produce the error envelope.
pub async fn submit_answer_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubmitAnswerRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| {
        tracing::debug!("Rejected submission body: {}", e);
        ApiError::invalid_input("Puzzle ID and answer are required")
    })?;
    let (puzzle_id, answer) = request.validate().map_err(ApiError::invalid_input)?;

    let participant = participant_id(&headers)?;
    let scope = state
        .scope_mode
        .resolve(participant)
        .ok_or_else(ApiError::unauthenticated)?;

    if let Some(limiter) = &state.submit_limiter
        && limiter
            .check_key(&submit_limit_key(participant, &scope))
            .is_err()
    {
        tracing::warn!(scope = %scope, "Submission rate limit exceeded");
        return Ok(too_many_requests("Too many attempts, please try again later"));
    }

    let result = state.service.submit(&scope, puzzle_id, answer)?;
    tracing::info!(
        scope = %scope,
        puzzle = puzzle_id.0,
        success = result.success,
        already_solved = result.already_solved,
        "Answer submitted"
    );
    Ok((StatusCode::OK, Json(result)).into_response())
}

// =============================================================================
// RESET HANDLER
// =============================================================================

/// Clear the caller's scope back to an empty state.
pub async fn reset_game_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResetResponse>, ApiError> {
    if !state.allow_reset {
        return Err(ApiError::reset_disabled());
    }
    let scope = resolve_scope(&state, &headers)?;
    let game_state = state.service.reset(&scope)?;
    tracing::warn!(scope = %scope, "Game state reset");
    Ok(Json(ResetResponse {
        success: true,
        game_state,
    }))
}

// =============================================================================
// PUZZLES HANDLER
// =============================================================================

/// Public catalog view.
pub async fn puzzles_handler(State(state): State<AppState>) -> Json<PuzzleDataResponse> {
    Json(PuzzleDataResponse::from_catalog(state.service.catalog()))
}
