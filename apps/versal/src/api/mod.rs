//! # Versal HTTP API Module
//!
//! This module implements the HTTP JSON API using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /api/game-state` - Current state plus the derived grid
//! - `POST /api/submit-answer` - Submit an answer for a puzzle
//! - `POST /api/reset-game` - Reset the caller's scope (disabled by default)
//! - `GET /api/puzzles` - Public catalog view (no answers)
//!
//! ## Configuration (Environment Variables)
//!
//! - `VERSAL_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `VERSAL_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `VERSAL_SUBMIT_LIMIT`: Submissions per participant per minute (default: 10, 0 to disable)
//! - `VERSAL_ALLOW_RESET`: Set to `1` to enable the reset route
//! - `VERSAL_ADMIN_KEY`: If set, the reset route requires this Bearer token

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{get_admin_key_from_env, keys_match};
pub use handlers::{
    ApiError, PARTICIPANT_HEADER, game_state_handler, health_handler, puzzles_handler,
    reset_game_handler, submit_answer_handler,
};
pub use middleware::{
    GlobalRateLimiter, SUBMIT_LIMITER_PRUNE_INTERVAL, SubmitRateLimiter, create_rate_limiter,
    create_submit_limiter, get_rate_limit_from_env, get_submit_limit_from_env,
    prune_submit_limiter, spawn_submit_limiter_pruning,
};
pub use types::{
    ErrorBody, ErrorResponse, GameStateResponse, HealthResponse, PuzzleDataResponse, PuzzleJson,
    ResetResponse, SubmitAnswerRequest,
};

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use versal_core::{GameService, ScopeMode, VersalError};

/// Request bodies are tiny; anything larger is refused.
const MAX_BODY_BYTES: usize = 16 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// Holds no game state of its own: every request loads from and commits to
/// the store behind the service.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<GameService>,
    pub scope_mode: ScopeMode,
    /// Per-participant submission limiter, `None` when disabled.
    pub submit_limiter: Option<SubmitRateLimiter>,
    pub allow_reset: bool,
}

impl AppState {
    /// Create app state, reading the submission limit and the reset switch
    /// from the environment.
    #[must_use]
    pub fn new(service: GameService, scope_mode: ScopeMode) -> Self {
        let allow_reset = std::env::var("VERSAL_ALLOW_RESET").is_ok_and(|v| v == "1");
        Self {
            service: Arc::new(service),
            scope_mode,
            submit_limiter: None,
            allow_reset,
        }
        .with_submit_limit(get_submit_limit_from_env())
    }

    /// Override the per-participant submission limit. Zero disables it.
    #[must_use]
    pub fn with_submit_limit(mut self, per_minute: u32) -> Self {
        self.submit_limiter = (per_minute > 0).then(|| create_submit_limiter(per_minute));
        self
    }

    /// Enable or disable the reset route.
    #[must_use]
    pub fn with_reset(mut self, allowed: bool) -> Self {
        self.allow_reset = allowed;
        self
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `VERSAL_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("VERSAL_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (VERSAL_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in VERSAL_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                with_api_headers(CorsLayer::new().allow_origin(allowed_origins))
            }
        }
        None => {
            tracing::info!("CORS: No VERSAL_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    with_api_headers(CorsLayer::new().allow_origin(origins))
}

fn with_api_headers(layer: CorsLayer) -> CorsLayer {
    layer
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(PARTICIPANT_HEADER),
        ])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Global rate limiting (if enabled)
/// 5. Admin key check on the reset route (if configured)
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    if state.submit_limiter.is_some() {
        tracing::info!("Per-participant submission limit enabled");
    } else {
        tracing::info!("Per-participant submission limit disabled");
    }
    if state.allow_reset {
        if get_admin_key_from_env().is_some() {
            tracing::info!("Reset route enabled behind admin key");
        } else {
            tracing::warn!(
                "Reset route enabled WITHOUT an admin key - anyone can wipe progress. \
                 Set VERSAL_ADMIN_KEY to protect it."
            );
        }
    }

    let reset_route = post(handlers::reset_game_handler)
        .route_layer(axum_middleware::from_fn(auth::admin_key_middleware));

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/game-state", get(handlers::game_state_handler))
        .route("/api/submit-answer", post(handlers::submit_answer_handler))
        .route("/api/reset-game", reset_route)
        .route("/api/puzzles", get(handlers::puzzles_handler));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), VersalError> {
    let limiter = state.submit_limiter.clone();
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| VersalError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Versal HTTP server listening on {}", addr);
    let pruner = limiter.map(middleware::spawn_submit_limiter_pruning);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| VersalError::Io(format!("Server error: {}", e)));

    if let Some(handle) = pruner {
        handle.abort();
    }
    served
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
