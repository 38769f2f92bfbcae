//! # Middleware Module
//!
//! Rate limiting for the Versal HTTP API.
//!
//! ## Configuration
//!
//! - `VERSAL_RATE_LIMIT`: Requests per second across all clients (default: 100, 0 to disable)
//! - `VERSAL_SUBMIT_LIMIT`: Answer submissions per participant per minute (default: 10, 0 to disable)

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::RateLimitingMiddleware,
    state::{InMemoryState, NotKeyed, keyed::DefaultKeyedStateStore},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Default global rate limit: 100 requests per second.
const DEFAULT_RPS: NonZeroU32 = NonZeroU32::new(100).unwrap();

/// Default submission limit: 10 attempts per participant per minute.
const DEFAULT_SUBMITS_PER_MINUTE: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// How often stale participant keys are dropped from the submission limiter.
pub const SUBMIT_LIMITER_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

// =============================================================================
// GLOBAL RATE LIMITER
// =============================================================================

/// Global rate limiter type alias.
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new global rate limiter. Zero falls back to the default.
pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

/// Get the global rate limit from `VERSAL_RATE_LIMIT`, or 100 if not set.
pub fn get_rate_limit_from_env() -> u32 {
    std::env::var("VERSAL_RATE_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100)
}

/// Rate limiting middleware.
///
/// Checks the global rate limiter before allowing requests through.
/// Returns 429 with the error envelope if the limit is exceeded.
pub async fn rate_limit_middleware(
    State(limiter): State<GlobalRateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            too_many_requests("Too many requests, please slow down")
        }
    }
}

// =============================================================================
// PER-PARTICIPANT SUBMISSION LIMITER
// =============================================================================

/// Keyed limiter for answer submissions, keyed by participant.
pub type SubmitRateLimiter =
    Arc<RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>>;

/// Create a keyed submission limiter. Zero falls back to the default.
pub fn create_submit_limiter(per_minute: u32) -> SubmitRateLimiter {
    let quota = NonZeroU32::new(per_minute).unwrap_or(DEFAULT_SUBMITS_PER_MINUTE);
    Arc::new(RateLimiter::keyed(Quota::per_minute(quota)))
}

/// Get the submission limit from `VERSAL_SUBMIT_LIMIT`, or 10 if not set.
pub fn get_submit_limit_from_env() -> u32 {
    std::env::var("VERSAL_SUBMIT_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10)
}

/// Drop participant keys whose budget has fully refilled.
///
/// Participant ids come from clients, so the key set only stays bounded if
/// this runs periodically.
pub fn prune_submit_limiter<C, MW>(
    limiter: &RateLimiter<String, DefaultKeyedStateStore<String>, C, MW>,
) where
    C: Clock,
    MW: RateLimitingMiddleware<C::Instant>,
{
    limiter.retain_recent();
    limiter.shrink_to_fit();
}

/// Prune the submission limiter on [`SUBMIT_LIMITER_PRUNE_INTERVAL`] until
/// the runtime shuts down.
pub fn spawn_submit_limiter_pruning(limiter: SubmitRateLimiter) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SUBMIT_LIMITER_PRUNE_INTERVAL);
        loop {
            interval.tick().await;
            prune_submit_limiter(&limiter);
            tracing::debug!(keys = limiter.len(), "Pruned submission limiter");
        }
    })
}

/// The 429 response shared by both limiters.
pub fn too_many_requests(message: &str) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorResponse::new("RATE_LIMIT", message, true)),
    )
        .into_response()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use governor::clock::FakeRelativeClock;
    use governor::middleware::NoOpMiddleware;

    #[test]
    fn test_create_rate_limiter() {
        let limiter = create_rate_limiter(50);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_create_rate_limiter_zero_defaults() {
        let limiter = create_rate_limiter(0);
        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_submit_limiter_is_per_key() {
        let limiter = create_submit_limiter(2);
        let alice = "participant:alice".to_string();
        let bob = "participant:bob".to_string();

        assert!(limiter.check_key(&alice).is_ok());
        assert!(limiter.check_key(&alice).is_ok());
        assert!(limiter.check_key(&alice).is_err());
        // Another participant has their own budget.
        assert!(limiter.check_key(&bob).is_ok());
    }

    #[test]
    fn test_prune_drops_refilled_keys_only() {
        let clock = FakeRelativeClock::default();
        let quota = Quota::per_minute(NonZeroU32::new(2).unwrap_or(DEFAULT_SUBMITS_PER_MINUTE));
        let limiter: RateLimiter<
            String,
            DefaultKeyedStateStore<String>,
            FakeRelativeClock,
            NoOpMiddleware<<FakeRelativeClock as Clock>::Instant>,
        > = RateLimiter::new(quota, DefaultKeyedStateStore::default(), clock.clone());

        assert!(limiter.check_key(&"participant:alice".to_string()).is_ok());
        prune_submit_limiter(&limiter);
        assert_eq!(limiter.len(), 1);

        clock.advance(Duration::from_secs(120));
        assert!(limiter.check_key(&"participant:bob".to_string()).is_ok());
        prune_submit_limiter(&limiter);
        // Alice's budget has refilled; Bob's is still in use.
        assert_eq!(limiter.len(), 1);
        assert!(limiter.check_key(&"participant:bob".to_string()).is_ok());
        assert!(limiter.check_key(&"participant:bob".to_string()).is_err());
    }

    #[tokio::test]
    async fn test_pruning_task_runs_in_background() {
        let limiter = create_submit_limiter(2);
        let handle = spawn_submit_limiter_pruning(limiter.clone());
        assert!(limiter.check_key(&"participant:carol".to_string()).is_ok());
        handle.abort();
        assert!(handle.await.is_err());
    }
}
