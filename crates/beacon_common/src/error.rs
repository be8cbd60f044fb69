// --- File: crates/beacon_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type for all Beacon errors.
///
/// Crate-specific errors convert into this type via `From`, which gives the HTTP
/// layer one place to map failures to status codes.
#[derive(Error, Debug)]
pub enum BeaconError {
    /// Error occurred during an HTTP request
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Error occurred while parsing data
    #[error("Failed to parse data: {0}")]
    ParseError(String),

    /// Error occurred due to missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error occurred during authentication or authorization
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error occurred during validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error occurred during database operation
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Error occurred during external service call
    #[error("External service error: {service_name} - {message}")]
    ExternalServiceError {
        service_name: String,
        message: String,
    },

    /// Error occurred due to a resource not being found
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Error occurred due to a timeout
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for BeaconError {
    fn status_code(&self) -> u16 {
        match self {
            BeaconError::HttpError(_) => 500,
            BeaconError::ParseError(_) => 400,
            BeaconError::ConfigError(_) => 500,
            BeaconError::AuthError(_) => 401,
            BeaconError::ValidationError(_) => 400,
            BeaconError::DatabaseError(_) => 500,
            BeaconError::ExternalServiceError { .. } => 502,
            BeaconError::NotFoundError(_) => 404,
            BeaconError::TimeoutError(_) => 504,
            BeaconError::InternalError(_) => 500,
        }
    }
}

/// Errors raised at the delivery provider seam.
///
/// Any of these fails the whole batch; per-token rejections are reported as
/// outcomes instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeliveryError {
    #[error("provider call timed out after {0} seconds")]
    Timeout(u64),

    #[error("provider transport error: {0}")]
    Transport(String),

    #[error("provider authentication failed: {0}")]
    Auth(String),

    #[error("provider rejected the batch: {code}: {message}")]
    Api { code: String, message: String },

    #[error("provider is not configured: {0}")]
    Config(String),

    #[error("provider returned a malformed response: {0}")]
    MalformedResponse(String),
}

impl DeliveryError {
    /// Stable code recorded in the batch-level error descriptor.
    pub fn code(&self) -> String {
        match self {
            DeliveryError::Timeout(_) => "messaging/deadline-exceeded".to_string(),
            DeliveryError::Transport(_) => "messaging/network-error".to_string(),
            DeliveryError::Auth(_) => "messaging/authentication-error".to_string(),
            DeliveryError::Api { code, .. } => code.clone(),
            DeliveryError::Config(_) => "messaging/configuration-error".to_string(),
            DeliveryError::MalformedResponse(_) => "messaging/malformed-response".to_string(),
        }
    }
}

/// Errors raised at the token and request store seams.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("store serialization error: {0}")]
    Serialization(String),
}

impl From<DeliveryError> for BeaconError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::Timeout(secs) => {
                BeaconError::TimeoutError(format!("push provider did not answer within {}s", secs))
            }
            DeliveryError::Auth(msg) => BeaconError::AuthError(msg),
            DeliveryError::Config(msg) => BeaconError::ConfigError(msg),
            other => external_service_error("push provider", other),
        }
    }
}

impl From<StoreError> for BeaconError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => BeaconError::NotFoundError(msg),
            StoreError::Backend(msg) => BeaconError::DatabaseError(msg),
            StoreError::Serialization(msg) => BeaconError::ParseError(msg),
        }
    }
}

impl From<serde_json::Error> for BeaconError {
    fn from(err: serde_json::Error) -> Self {
        BeaconError::ParseError(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> BeaconError {
    BeaconError::ConfigError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> BeaconError {
    BeaconError::ValidationError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> BeaconError {
    BeaconError::NotFoundError(message.to_string())
}

pub fn external_service_error<T: fmt::Display>(service_name: &str, message: T) -> BeaconError {
    BeaconError::ExternalServiceError {
        service_name: service_name.to_string(),
        message: message.to_string(),
    }
}

pub fn internal_error<T: fmt::Display>(message: T) -> BeaconError {
    BeaconError::InternalError(message.to_string())
}
