// --- File: crates/beacon_common/src/lib.rs ---

// Shared building blocks for the Beacon crates: data models, the error taxonomy,
// logging setup and the provider/store seams.

pub mod error; // Error handling
pub mod logging; // Logging utilities
pub mod models; // Data structures and models
pub mod services; // Provider and store abstractions

// Re-export error types and utilities for easier access
pub use error::{
    config_error, external_service_error, internal_error, not_found, validation_error,
    BeaconError, DeliveryError, HttpStatusCode, StoreError,
};

// Re-export logging utilities for easier access
pub use logging::{init, init_from_config, init_with_level};

pub use services::{BoxFuture, DeliveryProvider, RequestStore, TokenStore};
