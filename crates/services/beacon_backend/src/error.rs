//! HTTP error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use beacon_common::{BeaconError, HttpStatusCode, StoreError};
use beacon_dispatch::DispatchError;
use serde_json::json;

/// An error as returned to HTTP callers.
///
/// The body is `{"error": {"message", "code", "status"}}`, where `code` is the HTTP
/// status and `status` the callable error name (`invalid-argument`, ...).
#[derive(Debug)]
pub struct ApiError {
    error: BeaconError,
    status: &'static str,
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            error: BeaconError::NotFoundError(message.into()),
            status: "not-found",
        }
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            error: BeaconError::AuthError(message.into()),
            status: "unauthenticated",
        }
    }

    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self {
            error: BeaconError::ConfigError(message.into()),
            status: "internal",
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        let status = err.code();
        Self {
            error: BeaconError::from(err),
            status,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let status = match err {
            StoreError::NotFound(_) => "not-found",
            _ => "internal",
        };
        Self {
            error: BeaconError::from(err),
            status,
        }
    }
}

impl From<BeaconError> for ApiError {
    fn from(err: BeaconError) -> Self {
        let status = match err {
            BeaconError::ValidationError(_) | BeaconError::ParseError(_) => "invalid-argument",
            BeaconError::AuthError(_) => "unauthenticated",
            BeaconError::NotFoundError(_) => "not-found",
            _ => "internal",
        };
        Self { error: err, status }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let body = Json(json!({
            "error": {
                "message": self.error.to_string(),
                "code": status_code.as_u16(),
                "status": self.status,
            }
        }));
        (status_code, body).into_response()
    }
}
