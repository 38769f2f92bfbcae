//! Integration tests for the Versal HTTP API.
//!
//! Uses axum-test to drive the router without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await - tests touching env vars are
// serialized intentionally
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use serde_json::json;
use std::sync::{Arc, Mutex};
use versal::api::{
    AppState, ErrorResponse, GameStateResponse, HealthResponse, PuzzleDataResponse,
    ResetResponse, create_router,
};
use versal_core::{
    Catalog, GameService, GameStore, KvStore, LockPolicy, MemoryStore, PuzzleId, ScopeMode,
    SetId, SubmissionResult, TileState, VersalError,
};

/// Mutex to serialize tests since the router reads env vars.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

const PARTICIPANT: &str = "x-participant-id";

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and clears env vars on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        clear_env();
    }
}

fn clear_env() {
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe {
        std::env::remove_var("VERSAL_ADMIN_KEY");
        std::env::remove_var("VERSAL_RATE_LIMIT");
    }
}

fn lock_env() -> TestGuard {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    TestGuard { _guard: guard }
}

fn memory_service() -> GameService {
    GameService::new(GameStore::new(
        Arc::new(MemoryStore::new()),
        Arc::new(Catalog::builtin()),
    ))
}

/// Build a test server from app state. Submission limits are off unless a
/// test turns them on; reset is on.
fn server_with(state: AppState) -> (TestServer, TestGuard) {
    let guard = lock_env();
    let router = create_router(state);
    (TestServer::new(router).unwrap(), guard)
}

fn create_test_server() -> (TestServer, TestGuard) {
    server_with(
        AppState::new(memory_service(), ScopeMode::Global)
            .with_submit_limit(0)
            .with_reset(true),
    )
}

fn create_participant_server() -> (TestServer, TestGuard) {
    server_with(
        AppState::new(memory_service(), ScopeMode::PerParticipant)
            .with_submit_limit(0)
            .with_reset(true),
    )
}

fn participant_header() -> HeaderName {
    HeaderName::from_static(PARTICIPANT)
}

fn tile(state: &GameStateResponse, id: u32) -> TileState {
    state
        .grid
        .iter()
        .find(|cell| cell.puzzle_id == Some(PuzzleId(id)))
        .map(|cell| cell.state)
        .unwrap()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// GAME STATE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_game_state_initializes_on_first_access() {
    let (server, _guard) = create_test_server();

    let response = server.get("/api/game-state").await;

    response.assert_status_ok();
    let state: GameStateResponse = response.json();
    assert_eq!(state.state.version, 1);
    assert_eq!(state.state.total_solved, 0);
    assert!(!state.state.is_complete);
    assert_eq!(state.grid.len(), 9);
    for id in [1, 2, 3] {
        assert_eq!(tile(&state, id), TileState::Unlocked);
    }
    for id in [4, 5, 6, 7, 8, 9] {
        assert_eq!(tile(&state, id), TileState::Locked);
    }
}

#[tokio::test]
async fn test_game_state_is_stable_across_reads() {
    let (server, _guard) = create_test_server();

    let first: GameStateResponse = server.get("/api/game-state").await.json();
    let second: GameStateResponse = server.get("/api/game-state").await.json();

    assert_eq!(first.state.version, second.state.version);
}

#[tokio::test]
async fn test_game_state_uses_camel_case() {
    let (server, _guard) = create_test_server();

    let body: serde_json::Value = server.get("/api/game-state").await.json();

    for field in ["solvedPuzzles", "completedSets", "totalSolved", "isComplete", "version", "lastUpdated", "grid"] {
        assert!(body.get(field).is_some(), "missing {field}");
    }
    assert!(body["grid"][0].get("puzzleId").is_some());
}

// =============================================================================
// SUBMIT ANSWER ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_submit_correct_answer() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 1, "answer": " 1 " }))
        .await;

    response.assert_status_ok();
    let result: SubmissionResult = response.json();
    assert!(result.success);
    assert!(!result.already_solved);
    assert_eq!(result.target_label.as_deref(), Some("r/Science"));
    assert!(result.hint.is_some());
    let state = result.state.unwrap();
    assert_eq!(state.total_solved, 1);
    assert_eq!(state.version, 2);

    let state: GameStateResponse = server.get("/api/game-state").await.json();
    assert_eq!(tile(&state, 1), TileState::Solved);
    assert_eq!(tile(&state, 4), TileState::Unlocked);
    assert_eq!(tile(&state, 7), TileState::Locked);
}

#[tokio::test]
async fn test_submit_incorrect_answer_is_not_an_http_error() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 2, "answer": "nope" }))
        .await;

    response.assert_status_ok();
    let result: SubmissionResult = response.json();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("incorrect answer"));

    let state: GameStateResponse = server.get("/api/game-state").await.json();
    assert_eq!(state.state.version, 1);
}

#[tokio::test]
async fn test_submit_blank_answer_is_incorrect() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 1, "answer": "   " }))
        .await;

    response.assert_status_ok();
    let result: SubmissionResult = response.json();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("incorrect answer"));
}

#[tokio::test]
async fn test_submit_unknown_puzzle() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 42, "answer": "42" }))
        .await;

    response.assert_status_ok();
    let result: SubmissionResult = response.json();
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("invalid puzzle"));
}

#[tokio::test]
async fn test_submit_twice_is_idempotent() {
    let (server, _guard) = create_test_server();
    let body = json!({ "puzzleId": 3, "answer": "3" });

    let first: SubmissionResult = server.post("/api/submit-answer").json(&body).await.json();
    let second: SubmissionResult = server.post("/api/submit-answer").json(&body).await.json();

    assert!(first.success && second.success);
    assert!(second.already_solved);
    assert_eq!(
        first.state.unwrap().version,
        second.state.unwrap().version
    );
}

#[tokio::test]
async fn test_submit_missing_fields_is_bad_request() {
    let (server, _guard) = create_test_server();

    for body in [
        json!({ "puzzleId": 1 }),
        json!({ "answer": "1" }),
        json!({ "puzzleId": 1, "answer": "" }),
        json!({ "puzzleId": 0, "answer": "1" }),
        json!({ "puzzleId": "one", "answer": "1" }),
        json!({}),
    ] {
        let response = server.post("/api/submit-answer").json(&body).await;
        response.assert_status_bad_request();
        let error: ErrorResponse = response.json();
        assert!(!error.success);
        assert_eq!(error.error.code, "INVALID_INPUT");
        assert!(!error.error.retryable);
    }
}

#[tokio::test]
async fn test_submit_non_json_body_is_bad_request() {
    let (server, _guard) = create_test_server();

    let response = server.post("/api/submit-answer").text("puzzle=1").await;

    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert_eq!(error.error.code, "INVALID_INPUT");
}

#[tokio::test]
async fn test_set_completion_over_http() {
    let (server, _guard) = create_test_server();

    let mut last = None;
    for id in [1, 4, 7] {
        let result: SubmissionResult = server
            .post("/api/submit-answer")
            .json(&json!({ "puzzleId": id, "answer": id.to_string() }))
            .await
            .json();
        last = Some(result);
    }

    let last = last.unwrap();
    assert!(last.set_completed);
    assert!(last.state.unwrap().completed_sets.contains(&SetId(1)));
}

#[tokio::test]
async fn test_locked_puzzle_policy_enforced() {
    let (server, _guard) = server_with(
        AppState::new(
            memory_service().with_lock_policy(LockPolicy::Enforce),
            ScopeMode::Global,
        )
        .with_submit_limit(0),
    );

    let result: SubmissionResult = server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 7, "answer": "7" }))
        .await
        .json();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("puzzle locked"));
}

// =============================================================================
// PARTICIPANT SCOPE TESTS
// =============================================================================

#[tokio::test]
async fn test_participant_mode_requires_identity() {
    let (server, _guard) = create_participant_server();

    let response = server.get("/api/game-state").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error.code, "AUTH_ERROR");
}

#[tokio::test]
async fn test_participants_are_isolated() {
    let (server, _guard) = create_participant_server();

    let result: SubmissionResult = server
        .post("/api/submit-answer")
        .add_header(participant_header(), HeaderValue::from_static("alice"))
        .json(&json!({ "puzzleId": 1, "answer": "1" }))
        .await
        .json();
    assert!(result.success);

    let alice: GameStateResponse = server
        .get("/api/game-state")
        .add_header(participant_header(), HeaderValue::from_static("alice"))
        .await
        .json();
    let bob: GameStateResponse = server
        .get("/api/game-state")
        .add_header(participant_header(), HeaderValue::from_static("bob"))
        .await
        .json();

    assert_eq!(alice.state.total_solved, 1);
    assert_eq!(bob.state.total_solved, 0);
}

#[tokio::test]
async fn test_oversized_participant_id_is_rejected() {
    let (server, _guard) = create_participant_server();
    let long_id = "p".repeat(500);

    let response = server
        .get("/api/game-state")
        .add_header(participant_header(), long_id.parse::<HeaderValue>().unwrap())
        .await;

    response.assert_status_bad_request();
}

// =============================================================================
// RATE LIMIT TESTS
// =============================================================================

#[tokio::test]
async fn test_submission_rate_limit_per_participant() {
    let (server, _guard) = server_with(
        AppState::new(memory_service(), ScopeMode::PerParticipant).with_submit_limit(2),
    );
    let body = json!({ "puzzleId": 1, "answer": "wrong" });

    for _ in 0..2 {
        server
            .post("/api/submit-answer")
            .add_header(participant_header(), HeaderValue::from_static("carol"))
            .json(&body)
            .await
            .assert_status_ok();
    }

    let limited = server
        .post("/api/submit-answer")
        .add_header(participant_header(), HeaderValue::from_static("carol"))
        .json(&body)
        .await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let error: ErrorResponse = limited.json();
    assert_eq!(error.error.code, "RATE_LIMIT");
    assert!(error.error.retryable);

    // Another participant is unaffected.
    server
        .post("/api/submit-answer")
        .add_header(participant_header(), HeaderValue::from_static("dave"))
        .json(&body)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_submission_rate_limit_is_per_participant_in_global_mode() {
    let (server, _guard) =
        server_with(AppState::new(memory_service(), ScopeMode::Global).with_submit_limit(2));
    let body = json!({ "puzzleId": 1, "answer": "wrong" });

    for _ in 0..2 {
        server
            .post("/api/submit-answer")
            .add_header(participant_header(), HeaderValue::from_static("alice"))
            .json(&body)
            .await
            .assert_status_ok();
    }
    server
        .post("/api/submit-answer")
        .add_header(participant_header(), HeaderValue::from_static("alice"))
        .json(&body)
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);

    // Shared progress, separate attempt budgets.
    server
        .post("/api/submit-answer")
        .add_header(participant_header(), HeaderValue::from_static("bob"))
        .json(&body)
        .await
        .assert_status_ok();
}

// =============================================================================
// RESET ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_reset_disabled_by_default() {
    let (server, _guard) = server_with(
        AppState::new(memory_service(), ScopeMode::Global)
            .with_submit_limit(0)
            .with_reset(false),
    );

    let response = server.post("/api/reset-game").await;

    response.assert_status(StatusCode::FORBIDDEN);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error.code, "RESET_DISABLED");
}

#[tokio::test]
async fn test_reset_clears_progress() {
    let (server, _guard) = create_test_server();
    server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 1, "answer": "1" }))
        .await
        .assert_status_ok();

    let response = server.post("/api/reset-game").await;

    response.assert_status_ok();
    let reset: ResetResponse = response.json();
    assert!(reset.success);
    assert_eq!(reset.game_state.version, 1);
    assert!(reset.game_state.solved_puzzles.is_empty());

    let state: GameStateResponse = server.get("/api/game-state").await.json();
    assert_eq!(state.state.total_solved, 0);
}

#[tokio::test]
async fn test_reset_requires_admin_key_when_configured() {
    let (server, _guard) = create_test_server();
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("VERSAL_ADMIN_KEY", "hunt-master") };

    let missing = server.post("/api/reset-game").await;
    missing.assert_status(StatusCode::UNAUTHORIZED);

    let wrong = server
        .post("/api/reset-game")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not-the-key"),
        )
        .await;
    wrong.assert_status(StatusCode::UNAUTHORIZED);

    let ok = server
        .post("/api/reset-game")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer hunt-master"),
        )
        .await;
    ok.assert_status_ok();

    // Other routes never need the admin key.
    server.get("/api/game-state").await.assert_status_ok();
}

// =============================================================================
// PUZZLES ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_puzzles_never_expose_answers() {
    let (server, _guard) = create_test_server();

    let response = server.get("/api/puzzles").await;

    response.assert_status_ok();
    let raw: serde_json::Value = response.json();
    for puzzle in raw["puzzles"].as_array().unwrap() {
        assert!(puzzle.get("answer").is_none());
    }

    let data: PuzzleDataResponse = response.json();
    assert_eq!(data.puzzles.len(), 9);
    assert_eq!(data.grid_mapping.len(), 9);
    assert_eq!(data.set_configuration.len(), 3);
    assert_eq!(
        data.set_configuration[&SetId(2)],
        vec![PuzzleId(2), PuzzleId(5), PuzzleId(8)]
    );
}

// =============================================================================
// STORE FAILURE TESTS
// =============================================================================

/// A store whose every operation fails.
struct UnavailableStore;

impl KvStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, VersalError> {
        Err(VersalError::Storage("connection refused".to_string()))
    }
    fn set(&self, _key: &str, _value: &str) -> Result<(), VersalError> {
        Err(VersalError::Storage("connection refused".to_string()))
    }
    fn compare_and_set(
        &self,
        _key: &str,
        _expected: Option<&str>,
        _value: &str,
    ) -> Result<bool, VersalError> {
        Err(VersalError::Storage("connection refused".to_string()))
    }
    fn incr(&self, _key: &str) -> Result<u64, VersalError> {
        Err(VersalError::Storage("connection refused".to_string()))
    }
    fn delete(&self, _key: &str) -> Result<(), VersalError> {
        Err(VersalError::Storage("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_store_failure_is_retryable_and_opaque() {
    let service = GameService::new(GameStore::new(
        Arc::new(UnavailableStore),
        Arc::new(Catalog::builtin()),
    ));
    let (server, _guard) = server_with(AppState::new(service, ScopeMode::Global).with_submit_limit(0));

    let response = server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 1, "answer": "1" }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error.code, "STORE_UNAVAILABLE");
    assert!(error.error.retryable);
    assert!(!error.error.message.contains("connection refused"));
}

#[tokio::test]
async fn test_wrong_answer_needs_no_store() {
    let service = GameService::new(GameStore::new(
        Arc::new(UnavailableStore),
        Arc::new(Catalog::builtin()),
    ));
    let (server, _guard) = server_with(AppState::new(service, ScopeMode::Global).with_submit_limit(0));

    let response = server
        .post("/api/submit-answer")
        .json(&json!({ "puzzleId": 1, "answer": "2" }))
        .await;

    response.assert_status_ok();
    let result: SubmissionResult = response.json();
    assert_eq!(result.error.as_deref(), Some("incorrect answer"));
}
