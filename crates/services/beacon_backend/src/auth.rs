//! Bearer authentication against the configured callable api key.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use constant_time_eq::constant_time_eq;
use tracing::warn;

use crate::app_state::AppState;
use crate::error::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Identity recorded for callers holding the api key.
pub const API_KEY_CALLER: &str = "api-key";

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
}

/// Resolves the caller from the `Authorization` header.
///
/// `Ok(None)` means the request is unauthenticated. Fails when no api key is
/// configured at all.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Option<&'static str>, ApiError> {
    let Some(expected) = state.api_key() else {
        warn!("🚨 Callable api key not configured");
        return Err(ApiError::misconfigured("callable api key is not configured"));
    };

    let caller = bearer_token(headers)
        .filter(|provided| constant_time_eq(provided.as_bytes(), expected.as_bytes()))
        .map(|_| API_KEY_CALLER);
    if caller.is_none() {
        warn!("Rejected request with missing or invalid bearer token");
    }
    Ok(caller)
}

/// Middleware for routes that require the api key.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, req.headers()) {
        Ok(Some(_)) => next.run(req).await,
        Ok(None) => ApiError::unauthenticated("missing or invalid bearer token").into_response(),
        Err(e) => e.into_response(),
    }
}
