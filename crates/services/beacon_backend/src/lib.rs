//! HTTP service for Beacon push dispatch.
//!
//! Wires the stores, the FCM provider and the dispatch handlers from configuration
//! and exposes them through an axum router.

pub mod app_state;
pub mod auth;
#[cfg(feature = "openapi")]
pub mod doc;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod service_factory;

pub use app_state::{AppState, DispatchHandlers};
pub use error::ApiError;
pub use routes::{app, routes};
pub use service_factory::BeaconServiceFactory;
