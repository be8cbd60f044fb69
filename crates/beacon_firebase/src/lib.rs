//! Firebase Cloud Messaging delivery provider for Beacon
//!
//! This crate implements the `DeliveryProvider` seam on top of the FCM HTTP v1 API.
//!
//! # Features
//!
//! - Authentication with Firebase using service account credentials
//! - Multicast delivery built from concurrent per-token `messages:send` calls
//! - Android and APNs presentation blocks taken from the platform options
//! - Translation of FCM v1 error statuses into `messaging/*` error codes
//!
//! # Example
//!
//! ```rust,no_run
//! use beacon_config::FirebaseConfig;
//! use beacon_firebase::FirebaseClient;
//! use std::sync::Arc;
//!
//! let config = FirebaseConfig {
//!     project_id: Some("my-project".to_string()),
//!     key_path: Some("service-account.json".to_string()),
//!     api_base_url: None,
//! };
//! let provider: Arc<dyn beacon_common::DeliveryProvider> = Arc::new(FirebaseClient::new(config));
//! ```

pub mod auth;
pub mod client;

pub use auth::{AccessTokenSource, ServiceAccountTokenSource, StaticTokenSource};
pub use client::{map_fcm_error_code, FirebaseClient, FirebaseError};
