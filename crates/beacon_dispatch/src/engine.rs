//! Dispatch engine.
//!
//! One dispatch is one provider call for the whole token batch. The engine turns
//! the positional answers into counts and redacted error descriptors, writes the
//! final status exactly once, and hands permanently invalid tokens to the
//! [`TokenReconciler`].

use beacon_common::models::{
    is_permanently_invalid, DeliveryOutcome, DeviceToken, ErrorDetail, MulticastMessage,
    MulticastResponse, NotificationPayload, NotificationStatus, PlatformOptions,
};
use beacon_common::{DeliveryError, DeliveryProvider, RequestStore, TokenStore};
use beacon_config::{DispatchConfig, PlatformConfig};
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::reconciler::TokenReconciler;
use crate::recorder::{RecordOutcome, StatusRecorder, StatusReport};

/// Reason recorded when a request carries no tokens.
pub const NO_DEVICE_TOKENS: &str = "no device tokens provided";

/// Code used for a failed outcome that carries no provider error.
const UNKNOWN_ERROR_CODE: &str = "messaging/unknown-error";

/// What happened to one invalid token during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenReconciliation {
    /// Redacted form of the token.
    pub token: String,
    pub users_updated: Option<usize>,
    pub error: Option<String>,
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchResult {
    pub request_id: String,
    pub status: NotificationStatus,
    /// Tokens handed to the provider. Zero when the dispatch was rejected up front.
    pub attempted: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub error: Option<String>,
    pub error_details: Vec<ErrorDetail>,
    /// Set when the provider call failed as a whole.
    pub batch_error: Option<DeliveryError>,
    /// Per-token outcomes in token order. Empty unless the provider answered.
    pub responses: Vec<DeliveryOutcome>,
    pub reconciliations: Vec<TokenReconciliation>,
    pub record: RecordOutcome,
}

impl DispatchResult {
    fn rejected(request_id: &str, reason: String, record: RecordOutcome) -> Self {
        Self {
            request_id: request_id.to_string(),
            status: NotificationStatus::Error,
            attempted: 0,
            success_count: 0,
            failure_count: 0,
            error: Some(reason),
            error_details: Vec::new(),
            batch_error: None,
            responses: Vec::new(),
            reconciliations: Vec::new(),
            record,
        }
    }
}

pub struct DispatchEngine {
    provider: Arc<dyn DeliveryProvider>,
    reconciler: TokenReconciler,
    recorder: StatusRecorder,
    platform: PlatformOptions,
    provider_timeout: Duration,
}

impl DispatchEngine {
    pub fn new(
        provider: Arc<dyn DeliveryProvider>,
        reconciler: TokenReconciler,
        recorder: StatusRecorder,
        platform: PlatformOptions,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            reconciler,
            recorder,
            platform,
            provider_timeout,
        }
    }

    /// Wires the engine from configuration and the injected collaborators.
    pub fn from_config(
        provider: Arc<dyn DeliveryProvider>,
        token_store: Arc<dyn TokenStore>,
        request_store: Arc<dyn RequestStore>,
        dispatch: &DispatchConfig,
        platform: &PlatformConfig,
    ) -> Self {
        Self::new(
            provider,
            TokenReconciler::from_config(token_store, dispatch),
            StatusRecorder::new(request_store),
            PlatformOptions::from_config(platform),
            Duration::from_secs(dispatch.provider_timeout_secs),
        )
    }

    /// Sends `payload` to every token in one provider call and records the outcome.
    ///
    /// Never fails: batch failures, per-token failures and status write failures are
    /// all reported in the returned [`DispatchResult`]. Reconciliation of invalid
    /// tokens has finished when this returns.
    pub async fn dispatch(
        &self,
        request_id: &str,
        tokens: &[DeviceToken],
        payload: &NotificationPayload,
    ) -> DispatchResult {
        if tokens.is_empty() {
            info!("Request {} has no device tokens", request_id);
            return self.reject(request_id, NO_DEVICE_TOKENS).await;
        }

        info!("Dispatching request {} to {} tokens", request_id, tokens.len());
        let message = MulticastMessage::new(tokens.to_vec(), payload, self.platform.clone());

        match self.send(message, tokens.len()).await {
            Ok(response) => self.settle(request_id, tokens, response).await,
            Err(batch_error) => self.fail_batch(request_id, tokens.len(), batch_error).await,
        }
    }

    /// Records `reason` as an `error` status without calling the provider.
    pub async fn reject(&self, request_id: &str, reason: &str) -> DispatchResult {
        let record = self
            .recorder
            .record_status(request_id, StatusReport::error(reason, Vec::new()))
            .await;
        DispatchResult::rejected(request_id, reason.to_string(), record)
    }

    async fn send(
        &self,
        message: MulticastMessage,
        expected: usize,
    ) -> Result<MulticastResponse, DeliveryError> {
        let response = timeout(self.provider_timeout, self.provider.send_multicast(message))
            .await
            .map_err(|_| DeliveryError::Timeout(self.provider_timeout.as_secs()))??;

        if response.responses.len() != expected {
            return Err(DeliveryError::MalformedResponse(format!(
                "expected {} responses, got {}",
                expected,
                response.responses.len()
            )));
        }
        Ok(response)
    }

    async fn fail_batch(
        &self,
        request_id: &str,
        token_count: usize,
        batch_error: DeliveryError,
    ) -> DispatchResult {
        error!("Error sending batch for request {}: {}", request_id, batch_error);

        let message = format!("batch delivery failed: {}", batch_error);
        let details = vec![ErrorDetail::for_batch(batch_error.code(), batch_error.to_string())];
        let record = self
            .recorder
            .record_status(request_id, StatusReport::error(message.clone(), details.clone()))
            .await;

        DispatchResult {
            request_id: request_id.to_string(),
            status: NotificationStatus::Error,
            attempted: token_count,
            success_count: 0,
            failure_count: token_count,
            error: Some(message),
            error_details: details,
            batch_error: Some(batch_error),
            responses: Vec::new(),
            reconciliations: Vec::new(),
            record,
        }
    }

    async fn settle(
        &self,
        request_id: &str,
        tokens: &[DeviceToken],
        response: MulticastResponse,
    ) -> DispatchResult {
        let mut success_count = 0;
        let mut details = Vec::new();
        let mut invalid: Vec<&DeviceToken> = Vec::new();
        let mut seen = HashSet::new();

        for (token, outcome) in tokens.iter().zip(&response.responses) {
            if outcome.success {
                success_count += 1;
                continue;
            }

            let (code, message) = match &outcome.error {
                Some(err) => (err.code.as_str(), err.message.as_str()),
                None => (UNKNOWN_ERROR_CODE, "provider reported failure without an error"),
            };
            warn!("Error sending to token {}: {}", token, code);
            details.push(ErrorDetail::for_token(token, code, message));

            if is_permanently_invalid(code) && seen.insert(token) {
                invalid.push(token);
            }
        }
        let failure_count = tokens.len() - success_count;

        let report = StatusReport::delivery(success_count, failure_count, details.clone());
        let status = report.status;
        let record = self.recorder.record_status(request_id, report).await;

        let reconciliations = self.reconcile_all(&invalid).await;

        info!(
            "Push notification {} processed with status {}: {} successful, {} failed",
            request_id, status, success_count, failure_count
        );

        DispatchResult {
            request_id: request_id.to_string(),
            status,
            attempted: tokens.len(),
            success_count,
            failure_count,
            error: None,
            error_details: details,
            batch_error: None,
            responses: response.responses,
            reconciliations,
            record,
        }
    }

    async fn reconcile_all(&self, tokens: &[&DeviceToken]) -> Vec<TokenReconciliation> {
        join_all(tokens.iter().map(|token| self.reconcile_one(*token))).await
    }

    async fn reconcile_one(&self, token: &DeviceToken) -> TokenReconciliation {
        match self.reconciler.reconcile(token).await {
            Ok(result) => TokenReconciliation {
                token: token.redacted(),
                users_updated: Some(result.users_updated),
                error: None,
            },
            Err(e) => {
                error!("Failed to reconcile invalid token {}: {}", token, e);
                TokenReconciliation {
                    token: token.redacted(),
                    users_updated: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
