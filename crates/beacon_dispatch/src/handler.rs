//! Invocation entry points.
//!
//! Three ways into the engine: a created request document (trigger), a direct
//! authenticated call (callable), and a created user-targeted notification.

use beacon_common::models::{
    DeliveryOutcome, DeviceToken, DocumentCreatedEvent, NotificationPayload, NotificationRequest,
    NotificationStatus, UserNotification,
};
use beacon_common::{RequestStore, TokenStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::{DispatchEngine, DispatchResult, NO_DEVICE_TOKENS};
use crate::error::DispatchError;

/// Default value of the `type` data entry for user notifications.
pub const DEFAULT_NOTIFICATION_TYPE: &str = "general";

/// Checks a token batch against the provider's per-call limit.
pub fn validate_tokens(tokens: &[DeviceToken], max_batch_size: usize) -> Result<(), DispatchError> {
    if tokens.is_empty() {
        return Err(DispatchError::Validation(
            "tokens must be a non-empty array of device tokens".to_string(),
        ));
    }
    if tokens.len() > max_batch_size {
        return Err(DispatchError::Validation(format!(
            "too many device tokens: {} (max {})",
            tokens.len(),
            max_batch_size
        )));
    }
    if tokens.iter().any(DeviceToken::is_blank) {
        return Err(DispatchError::Validation(
            "device tokens must not be empty strings".to_string(),
        ));
    }
    Ok(())
}

/// Handles document-created events for notification requests.
///
/// Never returns an error: every outcome, including validation failures, is
/// recorded on the request itself.
pub struct TriggerHandler {
    engine: Arc<DispatchEngine>,
    max_batch_size: usize,
}

impl TriggerHandler {
    pub fn new(engine: Arc<DispatchEngine>, max_batch_size: usize) -> Self {
        Self {
            engine,
            max_batch_size,
        }
    }

    pub async fn handle(&self, event: DocumentCreatedEvent<NotificationRequest>) -> DispatchResult {
        let request_id = event.document_id.as_str();
        let request = &event.data;
        info!("Processing push notification {}", request_id);

        // An empty batch records the canonical reason whatever the payload holds.
        if request.tokens.is_empty() {
            warn!("No device tokens for push notification {}", request_id);
            return self.engine.reject(request_id, NO_DEVICE_TOKENS).await;
        }
        if let Err(e) = validate_tokens(&request.tokens, self.max_batch_size) {
            warn!("Rejecting push notification {}: {}", request_id, e);
            return self.engine.reject(request_id, &e.to_string()).await;
        }
        if let Err(e) = request.payload.validate() {
            warn!("Rejecting push notification {}: {}", request_id, e);
            return self.engine.reject(request_id, &e.to_string()).await;
        }

        self.engine
            .dispatch(request_id, &request.tokens, &request.payload)
            .await
    }
}

/// Title and body of a callable request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

/// Body of a callable send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallableRequest {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub tokens: Vec<DeviceToken>,
    pub notification: NotificationContent,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Answer to a callable send. `results[i]` belongs to `tokens[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CallableResponse {
    pub success: bool,
    pub request_id: String,
    pub success_count: usize,
    pub failure_count: usize,
    pub results: Vec<DeliveryOutcome>,
}

/// Handles direct, authenticated send calls.
pub struct CallableHandler {
    engine: Arc<DispatchEngine>,
    requests: Arc<dyn RequestStore>,
    max_batch_size: usize,
}

impl CallableHandler {
    pub fn new(engine: Arc<DispatchEngine>, requests: Arc<dyn RequestStore>, max_batch_size: usize) -> Self {
        Self {
            engine,
            requests,
            max_batch_size,
        }
    }

    /// Validates, persists and dispatches a callable request.
    ///
    /// `caller` is the authenticated caller's id, `None` when authentication failed.
    pub async fn send(
        &self,
        caller: Option<&str>,
        request: CallableRequest,
    ) -> Result<CallableResponse, DispatchError> {
        let caller = caller.ok_or_else(|| {
            DispatchError::Unauthenticated(
                "the function must be called while authenticated".to_string(),
            )
        })?;

        validate_tokens(&request.tokens, self.max_batch_size)?;
        let payload = NotificationPayload {
            title: request.notification.title,
            body: request.notification.body,
            data: request.data,
        };
        payload.validate()?;

        let record = NotificationRequest::new(Uuid::new_v4().to_string(), request.tokens, payload);
        let record = self.requests.insert_request(record).await?;
        info!(
            "Caller {} sending request {} to {} tokens",
            caller,
            record.id,
            record.tokens.len()
        );

        let result = self
            .engine
            .dispatch(&record.id, &record.tokens, &record.payload)
            .await;

        if let Some(batch_error) = result.batch_error {
            error!("Error sending message for request {}: {}", record.id, batch_error);
            return Err(DispatchError::Delivery(batch_error));
        }

        info!(
            "Successfully sent message: {} successful, {} failed",
            result.success_count, result.failure_count
        );
        Ok(CallableResponse {
            success: true,
            request_id: result.request_id,
            success_count: result.success_count,
            failure_count: result.failure_count,
            results: result.responses,
        })
    }
}

/// Outcome of a user-targeted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserNotificationOutcome {
    pub success: bool,
    pub notification_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl UserNotificationOutcome {
    fn from_result(result: &DispatchResult) -> Self {
        Self {
            success: result.success_count > 0,
            notification_id: result.request_id.clone(),
            error: result.error.clone(),
            success_count: result.success_count,
            failure_count: result.failure_count,
        }
    }

    fn from_record(record: &NotificationRequest) -> Self {
        let success_count = record.success_count.unwrap_or(0);
        Self {
            success: success_count > 0,
            notification_id: record.id.clone(),
            error: record.error.clone(),
            success_count,
            failure_count: record.failure_count.unwrap_or(0),
        }
    }

    fn failed(notification_id: &str, error: String) -> Self {
        Self {
            success: false,
            notification_id: notification_id.to_string(),
            error: Some(error),
            success_count: 0,
            failure_count: 0,
        }
    }
}

/// Sends a notification to every device of one user.
///
/// The notification is stored as a request under its own id, so its status can be
/// read back like any other request.
pub struct UserNotificationHandler {
    engine: Arc<DispatchEngine>,
    tokens: Arc<dyn TokenStore>,
    requests: Arc<dyn RequestStore>,
    max_batch_size: usize,
}

impl UserNotificationHandler {
    pub fn new(
        engine: Arc<DispatchEngine>,
        tokens: Arc<dyn TokenStore>,
        requests: Arc<dyn RequestStore>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            engine,
            tokens,
            requests,
            max_batch_size,
        }
    }

    /// Builds the message payload: `notificationId`, `type`, then the metadata.
    pub fn payload_for(notification_id: &str, notification: &UserNotification) -> NotificationPayload {
        let mut payload = NotificationPayload::new(&notification.title, &notification.body)
            .with_data("notificationId", notification_id)
            .with_data(
                "type",
                notification
                    .notification_type
                    .as_deref()
                    .unwrap_or(DEFAULT_NOTIFICATION_TYPE),
            );
        payload.data.extend(
            notification
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        payload
    }

    /// Never returns an error: store failures come back as an unsuccessful outcome.
    ///
    /// Events may be delivered more than once. A notification whose request is
    /// already settled is not sent again; a pending one is dispatched from the
    /// stored request.
    pub async fn handle(&self, event: DocumentCreatedEvent<UserNotification>) -> UserNotificationOutcome {
        let notification_id = event.document_id.as_str();
        match self.deliver(notification_id, &event.data).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Error sending notification {}: {}", notification_id, e);
                UserNotificationOutcome::failed(notification_id, e.to_string())
            }
        }
    }

    async fn deliver(
        &self,
        notification_id: &str,
        notification: &UserNotification,
    ) -> Result<UserNotificationOutcome, DispatchError> {
        let record = match self.requests.get_request(notification_id).await? {
            Some(existing) if existing.status != NotificationStatus::Pending => {
                info!(
                    "Notification {} already {}, skipping duplicate delivery",
                    notification_id, existing.status
                );
                return Ok(UserNotificationOutcome::from_record(&existing));
            }
            Some(existing) => existing,
            None => {
                let tokens = self.user_tokens(&notification.user_id).await?;
                let payload = Self::payload_for(notification_id, notification);
                self.requests
                    .insert_request(NotificationRequest::new(notification_id, tokens, payload))
                    .await?
            }
        };

        let rejection = if notification.user_id.trim().is_empty() {
            Some("no user id in notification".to_string())
        } else if record.tokens.is_empty() {
            Some(format!("no device tokens found for user {}", notification.user_id))
        } else if let Err(e) = validate_tokens(&record.tokens, self.max_batch_size) {
            Some(e.to_string())
        } else if let Err(e) = record.payload.validate() {
            Some(e.to_string())
        } else {
            None
        };

        let result = match rejection {
            Some(reason) => {
                warn!("Notification {} not sent: {}", notification_id, reason);
                self.engine.reject(notification_id, &reason).await
            }
            None => {
                self.engine
                    .dispatch(notification_id, &record.tokens, &record.payload)
                    .await
            }
        };

        Ok(UserNotificationOutcome::from_result(&result))
    }

    async fn user_tokens(&self, user_id: &str) -> Result<Vec<DeviceToken>, DispatchError> {
        if user_id.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tokens = self
            .tokens
            .tokens_for_user(user_id)
            .await?
            .map(|set| set.tokens.into_iter().collect())
            .unwrap_or_default();
        Ok(tokens)
    }
}
