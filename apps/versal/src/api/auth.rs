//! # Admin Authentication
//!
//! Bearer-key gate for administrative routes (game reset).
//!
//! ## Configuration
//!
//! - `VERSAL_ADMIN_KEY`: If set, admin routes require this key
//!
//! ## Usage
//!
//! ```text
//! Authorization: Bearer <admin-key>
//! ```
//!
//! Participant identity is not authenticated here; the host platform
//! supplies it in the `X-Participant-Id` header.

use super::types::ErrorResponse;
use axum::{
    Json,
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

// =============================================================================
// ADMIN KEY
// =============================================================================

/// Get the admin key from the environment.
///
/// Returns `Some(key)` if `VERSAL_ADMIN_KEY` is set and non-empty.
pub fn get_admin_key_from_env() -> Option<String> {
    std::env::var("VERSAL_ADMIN_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Compare two keys in constant time.
///
/// Both sides are padded to the same length so the comparison always runs
/// over the same number of bytes.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// Admin key middleware, layered on admin routes only.
///
/// Without `VERSAL_ADMIN_KEY` every request passes.
pub async fn admin_key_middleware(request: Request<Body>, next: Next) -> Response {
    let Some(expected) = get_admin_key_from_env() else {
        return next.run(request).await;
    };

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(key) if keys_match(key, &expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_admin_key",
                "Admin authentication failed: invalid key"
            );
            unauthorized()
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header on admin route"
            );
            unauthorized()
        }
    }
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new(
            "AUTH_ERROR",
            "Admin credentials required",
            false,
        )),
    )
        .into_response()
}

// =============================================================================
// TESTS
// =============================================================================
