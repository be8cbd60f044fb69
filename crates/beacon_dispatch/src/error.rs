//! Errors surfaced by the dispatch handlers.
//!
//! Trigger invocations never raise; these errors only reach callable callers.

use beacon_common::{BeaconError, DeliveryError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request was malformed. Never retried.
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// The caller did not present valid credentials.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// The provider call failed for the whole batch.
    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DispatchError {
    /// Error code reported to callable callers.
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Validation(_) => "invalid-argument",
            DispatchError::Unauthenticated(_) => "unauthenticated",
            DispatchError::Delivery(_) | DispatchError::Store(_) => "internal",
        }
    }
}

impl From<BeaconError> for DispatchError {
    fn from(err: BeaconError) -> Self {
        match err {
            BeaconError::ValidationError(msg) => DispatchError::Validation(msg),
            BeaconError::AuthError(msg) => DispatchError::Unauthenticated(msg),
            other => DispatchError::Store(StoreError::Backend(other.to_string())),
        }
    }
}

impl From<DispatchError> for BeaconError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(msg) => BeaconError::ValidationError(msg),
            DispatchError::Unauthenticated(msg) => BeaconError::AuthError(msg),
            // Provider failures are the service's problem, not the caller's.
            DispatchError::Delivery(e) => BeaconError::InternalError(format!("push delivery failed: {}", e)),
            DispatchError::Store(e) => BeaconError::from(e),
        }
    }
}
