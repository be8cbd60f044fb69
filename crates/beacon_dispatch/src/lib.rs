//! Push dispatch for Beacon
//!
//! The core of the service: the [`DispatchEngine`] fans one message out to a batch
//! of device tokens through a [`beacon_common::DeliveryProvider`], the
//! [`TokenReconciler`] purges tokens the provider reports as permanently invalid,
//! and the [`StatusRecorder`] writes the outcome back onto the request record.
//!
//! Collaborators are injected as trait objects, so the engine runs unchanged
//! against FCM and SQL stores in production and against in-memory fakes in tests.

pub mod engine;
pub mod error;
pub mod handler;
pub mod reconciler;
pub mod recorder;
pub mod retry;

pub use engine::{DispatchEngine, DispatchResult, TokenReconciliation, NO_DEVICE_TOKENS};
pub use error::DispatchError;
pub use handler::{
    validate_tokens, CallableHandler, CallableRequest, CallableResponse, NotificationContent,
    TriggerHandler, UserNotificationHandler, UserNotificationOutcome,
};
pub use reconciler::{ReconcileResult, TokenReconciler};
pub use recorder::{RecordOutcome, StatusRecorder, StatusReport};
pub use retry::{retry_async, Backoff, RetryConfig};
