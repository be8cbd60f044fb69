//! HTTP handlers for push dispatch.
//!
//! `POST /push/send` authenticates on its own so an unauthenticated caller gets the
//! callable `unauthenticated` error. Every other route sits behind
//! [`crate::auth::require_api_key`].

use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
};
use beacon_common::models::{
    DeviceToken, DocumentCreatedEvent, NotificationPayload, NotificationRequest, UserNotification,
};
use beacon_common::validation_error;
use beacon_dispatch::{CallableRequest, CallableResponse, UserNotificationOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::app_state::{AppState, DispatchHandlers};
use crate::auth::authenticate;
use crate::error::ApiError;

fn dispatch_handlers(state: &AppState) -> Result<Arc<DispatchHandlers>, ApiError> {
    state
        .dispatch
        .clone()
        .ok_or_else(|| ApiError::misconfigured("no delivery provider is configured"))
}

/// Direct send: validates, persists and dispatches in one call.
#[axum::debug_handler]
pub async fn send_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CallableRequest>,
) -> Result<Json<CallableResponse>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let handlers = dispatch_handlers(&state)?;
    let response = handlers.callable.send(caller, request).await?;
    Ok(Json(response))
}

/// Body of `POST /push/notifications`.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateNotificationRequest {
    /// Request id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Vec<String>))]
    pub tokens: Vec<DeviceToken>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Stores a notification request and processes it like a created document.
///
/// Processing failures are recorded on the request rather than returned, so the
/// response is the stored request with its final status.
#[axum::debug_handler]
pub async fn create_notification_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<NotificationRequest>), ApiError> {
    let handlers = dispatch_handlers(&state)?;

    let id = body.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let payload = NotificationPayload {
        title: body.title,
        body: body.body,
        data: body.data,
    };
    let request = state
        .requests
        .insert_request(NotificationRequest::new(id, body.tokens, payload))
        .await?;
    info!("Created push notification {}", request.id);

    let request_id = request.id.clone();
    handlers
        .trigger
        .handle(DocumentCreatedEvent::new(request_id.clone(), request))
        .await;

    let stored = state
        .requests
        .get_request(&request_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("notification {}", request_id)))?;
    Ok((StatusCode::CREATED, Json(stored)))
}

#[axum::debug_handler]
pub async fn get_notification_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NotificationRequest>, ApiError> {
    state
        .requests
        .get_request(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("notification {}", id)))
}

/// Body of `POST /users/{user_id}/notifications`.
#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserNotificationBody {
    /// Notification id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub body: String,
    #[serde(default, rename = "type")]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[axum::debug_handler]
pub async fn user_notification_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UserNotificationBody>,
) -> Result<Json<UserNotificationOutcome>, ApiError> {
    let handlers = dispatch_handlers(&state)?;

    let id = body.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let notification = UserNotification {
        user_id,
        title: body.title,
        body: body.body,
        notification_type: body.notification_type,
        metadata: body.metadata,
    };
    let outcome = handlers
        .users
        .handle(DocumentCreatedEvent::new(id, notification))
        .await;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegisterTokenRequest {
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub token: DeviceToken,
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RegisterTokenResponse {
    pub user_id: String,
    pub token_count: usize,
    pub last_token_update: Option<DateTime<Utc>>,
}

/// Adds a device token to a user's set.
#[axum::debug_handler]
pub async fn register_device_token_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<RegisterTokenRequest>,
) -> Result<Json<RegisterTokenResponse>, ApiError> {
    if body.token.is_blank() {
        return Err(validation_error("token must not be empty").into());
    }
    if user_id.trim().is_empty() {
        return Err(validation_error("user id must not be empty").into());
    }

    let set = state.tokens.add_token(&user_id, &body.token).await?;
    info!("Registered device token {} for user {}", body.token, user_id);
    Ok(Json(RegisterTokenResponse {
        user_id: set.user_id,
        token_count: set.tokens.len(),
        last_token_update: set.last_token_update,
    }))
}
