#![allow(dead_code)]
use utoipa::OpenApi;

use beacon_common::models::{
    DeliveryOutcome, ErrorDetail, NotificationPayload, NotificationRequest, NotificationStatus,
    ProviderError,
};
use beacon_dispatch::{CallableRequest, CallableResponse, NotificationContent, UserNotificationOutcome};

use crate::handlers::{
    CreateNotificationRequest, RegisterTokenRequest, RegisterTokenResponse, UserNotificationBody,
};

#[utoipa::path(
    post,
    path = "/push/send",
    request_body(content = CallableRequest, example = json!({
        "tokens": ["fcm-token-1", "fcm-token-2"],
        "notification": { "title": "Reminder", "body": "Your appointment is tomorrow" },
        "data": { "appointmentId": "77" }
    })),
    responses(
        (status = 200, description = "Batch sent, results are positional", body = CallableResponse),
        (status = 400, description = "Invalid argument",
         example = json!({ "error": { "message": "Validation error: tokens must be a non-empty array of device tokens", "code": 400, "status": "invalid-argument" } })
        ),
        (status = 401, description = "Unauthenticated"),
        (status = 500, description = "The provider call failed")
    ),
    tag = "Push"
)]
fn doc_send_handler() {}

#[utoipa::path(
    post,
    path = "/push/notifications",
    request_body(content = CreateNotificationRequest, example = json!({
        "tokens": ["fcm-token-1"],
        "title": "New Message",
        "body": "You have received a new message",
        "data": { "campaign": "spring" }
    })),
    responses(
        (status = 201, description = "Request stored and processed", body = NotificationRequest),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "Push"
)]
fn doc_create_notification_handler() {}

#[utoipa::path(
    get,
    path = "/push/notifications/{id}",
    params(("id" = String, Path, description = "Notification request id")),
    responses(
        (status = 200, description = "The stored request", body = NotificationRequest),
        (status = 404, description = "Unknown request")
    ),
    tag = "Push"
)]
fn doc_get_notification_handler() {}

#[utoipa::path(
    post,
    path = "/users/{user_id}/notifications",
    params(("user_id" = String, Path, description = "Target user")),
    request_body(content = UserNotificationBody, example = json!({
        "title": "New message",
        "body": "You have a new message",
        "type": "chat",
        "metadata": { "chatId": "c-9" }
    })),
    responses(
        (status = 200, description = "Notification processed", body = UserNotificationOutcome)
    ),
    tag = "Users"
)]
fn doc_user_notification_handler() {}

#[utoipa::path(
    post,
    path = "/users/{user_id}/device-tokens",
    params(("user_id" = String, Path, description = "Token owner")),
    request_body(content = RegisterTokenRequest, example = json!({ "token": "fcm-token-1" })),
    responses(
        (status = 200, description = "Token registered", body = RegisterTokenResponse),
        (status = 400, description = "Empty token")
    ),
    tag = "Users"
)]
fn doc_register_device_token_handler() {}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Beacon API",
        version = "0.1.0",
        description = "Push notification dispatch"
    ),
    paths(
        doc_send_handler,
        doc_create_notification_handler,
        doc_get_notification_handler,
        doc_user_notification_handler,
        doc_register_device_token_handler,
    ),
    components(
        schemas(
            CallableRequest,
            CallableResponse,
            NotificationContent,
            CreateNotificationRequest,
            NotificationRequest,
            NotificationPayload,
            NotificationStatus,
            ErrorDetail,
            DeliveryOutcome,
            ProviderError,
            UserNotificationBody,
            UserNotificationOutcome,
            RegisterTokenRequest,
            RegisterTokenResponse,
        )
    ),
    tags(
        (name = "Push", description = "Token batch dispatch"),
        (name = "Users", description = "User devices and user-targeted notifications")
    ),
    servers(
        (url = "/api", description = "Main API Prefix")
    )
)]
pub struct BeaconApiDoc;
