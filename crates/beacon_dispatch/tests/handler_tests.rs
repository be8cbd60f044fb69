mod fixtures;

use beacon_common::models::{
    DeviceToken, DocumentCreatedEvent, NotificationPayload, NotificationRequest,
    NotificationStatus, UserNotification,
};
use beacon_common::{DeliveryError, RequestStore};
use beacon_db::InMemoryRequestStore;
use beacon_dispatch::{
    CallableHandler, CallableRequest, DispatchError, NotificationContent, TriggerHandler,
    UserNotificationHandler, NO_DEVICE_TOKENS,
};
use fixtures::*;
use std::collections::BTreeMap;
use std::sync::Arc;

fn callable_request(token_values: &[&str]) -> CallableRequest {
    CallableRequest {
        tokens: tokens(token_values),
        notification: NotificationContent {
            title: "Reminder".to_string(),
            body: "Your appointment is tomorrow".to_string(),
        },
        data: BTreeMap::from([("appointmentId".to_string(), "77".to_string())]),
    }
}

#[tokio::test]
async fn test_trigger_dispatches_a_created_request() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let requests = Arc::new(InMemoryRequestStore::new());
    let request = seed_request(&requests, "doc-1", &["tok-one-123456"]).await;
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = TriggerHandler::new(engine, 500);

    let result = handler.handle(DocumentCreatedEvent::new("doc-1", request)).await;

    assert_eq!(result.status, NotificationStatus::Delivered);
    assert_eq!(provider.call_count(), 1);
    let stored = requests.get_request("doc-1").await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Delivered);
}

#[tokio::test]
async fn test_trigger_records_validation_failures_instead_of_raising() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let requests = Arc::new(InMemoryRequestStore::new());
    let mut request = NotificationRequest::new(
        "doc-2",
        tokens(&["tok-one-123456"]),
        NotificationPayload::new("   ", "body"),
    );
    request = requests.insert_request(request).await.unwrap();
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = TriggerHandler::new(engine, 500);

    let result = handler.handle(DocumentCreatedEvent::new("doc-2", request)).await;

    assert_eq!(result.status, NotificationStatus::Error);
    assert_eq!(provider.call_count(), 0);
    let stored = requests.get_request("doc-2").await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Error);
    assert!(stored.error.unwrap().contains("title"));
}

#[tokio::test]
async fn test_trigger_rejects_batches_over_the_limit() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let requests = Arc::new(InMemoryRequestStore::new());
    let request = seed_request(&requests, "doc-3", &["t-1", "t-2", "t-3"]).await;
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = TriggerHandler::new(engine, 2);

    let result = handler.handle(DocumentCreatedEvent::new("doc-3", request)).await;

    assert_eq!(result.status, NotificationStatus::Error);
    assert_eq!(provider.call_count(), 0);
    assert!(result.error.unwrap().contains("too many device tokens"));
}

#[tokio::test]
async fn test_trigger_with_no_tokens_records_the_canonical_reason() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let requests = Arc::new(InMemoryRequestStore::new());
    let request = seed_request(&requests, "doc-4", &[]).await;
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = TriggerHandler::new(engine, 500);

    handler.handle(DocumentCreatedEvent::new("doc-4", request)).await;

    let stored = requests.get_request("doc-4").await.unwrap().unwrap();
    assert_eq!(stored.error.as_deref(), Some("no device tokens provided"));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_trigger_with_no_tokens_and_invalid_payload_records_no_device_tokens() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let requests = Arc::new(InMemoryRequestStore::new());
    let request = NotificationRequest::new("doc-5", Vec::new(), NotificationPayload::new("", ""));
    let request = requests.insert_request(request).await.unwrap();
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = TriggerHandler::new(engine, 500);

    let result = handler.handle(DocumentCreatedEvent::new("doc-5", request)).await;

    assert_eq!(result.status, NotificationStatus::Error);
    assert_eq!(result.error.as_deref(), Some(NO_DEVICE_TOKENS));
    let stored = requests.get_request("doc-5").await.unwrap().unwrap();
    assert_eq!(stored.error.as_deref(), Some(NO_DEVICE_TOKENS));
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_trigger_redelivery_rerecords_without_raising() {
    let provider = ScriptedProvider::new(Script::Outcomes(vec![delivered("1"), invalid_token()]));
    let token_store = ObservedTokenStore::new();
    token_store.insert_user("carol", &["good-token-1", "stale-token-1"]).await;
    let requests = Arc::new(InMemoryRequestStore::new());
    let request = seed_request(&requests, "doc-6", &["good-token-1", "stale-token-1"]).await;
    let engine = Arc::new(build_engine(provider.clone(), token_store.clone(), requests.clone()));
    let handler = TriggerHandler::new(engine, 500);

    let first = handler
        .handle(DocumentCreatedEvent::new("doc-6", request.clone()))
        .await;
    let second = handler.handle(DocumentCreatedEvent::new("doc-6", request)).await;

    assert_eq!(first.status, NotificationStatus::Delivered);
    assert_eq!(second.status, NotificationStatus::Delivered);
    assert_eq!(second.success_count, 1);
    assert_eq!(second.failure_count, 1);
    // The second pass finds no holder of the stale token left to change.
    assert_eq!(token_store.tokens_of("carol").await, vec!["good-token-1".to_string()]);
    let stored = requests.get_request("doc-6").await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Delivered);
    assert_eq!(stored.success_count, Some(1));
    assert_eq!(stored.failure_count, Some(1));
}

#[tokio::test]
async fn test_callable_requires_an_authenticated_caller() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = CallableHandler::new(engine, requests, 500);

    let err = handler.send(None, callable_request(&["tok-1"])).await.unwrap_err();

    assert!(matches!(err, DispatchError::Unauthenticated(_)));
    assert_eq!(err.code(), "unauthenticated");
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_callable_validates_tokens_and_notification() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = CallableHandler::new(engine, requests, 2);

    let err = handler.send(Some("app"), callable_request(&[])).await.unwrap_err();
    assert_eq!(err.code(), "invalid-argument");

    let err = handler
        .send(Some("app"), callable_request(&["a", "b", "c"]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid-argument");

    let err = handler
        .send(Some("app"), callable_request(&["a", " "]))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "invalid-argument");

    let mut missing_body = callable_request(&["a"]);
    missing_body.notification.body = String::new();
    let err = handler.send(Some("app"), missing_body).await.unwrap_err();
    assert!(matches!(err, DispatchError::Validation(_)));

    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_callable_returns_positional_results_and_persists_the_request() {
    let provider = ScriptedProvider::new(Script::Outcomes(vec![delivered("1"), quota_exceeded()]));
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider.clone(), ObservedTokenStore::new(), requests.clone()));
    let handler = CallableHandler::new(engine, requests.clone(), 500);

    let response = handler
        .send(Some("app"), callable_request(&["good-123456", "busy-123456"]))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.success_count, 1);
    assert_eq!(response.failure_count, 1);
    assert_eq!(response.results.len(), 2);
    assert!(response.results[0].success);
    assert_eq!(
        response.results[1].error.as_ref().map(|e| e.code.as_str()),
        Some("messaging/quota-exceeded")
    );

    let stored = requests.get_request(&response.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Delivered);
    assert_eq!(stored.payload.data.get("appointmentId").map(String::as_str), Some("77"));
}

#[tokio::test]
async fn test_callable_batch_failure_is_an_internal_error() {
    let provider = ScriptedProvider::new(Script::Fail(DeliveryError::Auth("expired".to_string())));
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider, ObservedTokenStore::new(), requests.clone()));
    let handler = CallableHandler::new(engine, requests, 500);

    let err = handler.send(Some("app"), callable_request(&["tok-1"])).await.unwrap_err();

    assert!(matches!(err, DispatchError::Delivery(DeliveryError::Auth(_))));
    assert_eq!(err.code(), "internal");
}

fn user_notification(user_id: &str) -> UserNotification {
    UserNotification {
        user_id: user_id.to_string(),
        title: "New message".to_string(),
        body: "You have a new message".to_string(),
        notification_type: None,
        metadata: BTreeMap::from([("chatId".to_string(), "c-9".to_string())]),
    }
}

#[test]
fn test_user_payload_carries_id_type_and_metadata() {
    let mut notification = user_notification("alice");
    let payload = UserNotificationHandler::payload_for("n-1", &notification);
    assert_eq!(payload.data.get("notificationId").map(String::as_str), Some("n-1"));
    assert_eq!(payload.data.get("type").map(String::as_str), Some("general"));
    assert_eq!(payload.data.get("chatId").map(String::as_str), Some("c-9"));

    notification.notification_type = Some("chat".to_string());
    let payload = UserNotificationHandler::payload_for("n-1", &notification);
    assert_eq!(payload.data.get("type").map(String::as_str), Some("chat"));
}

#[tokio::test]
async fn test_user_notification_reaches_every_device_and_prunes_invalid_ones() {
    let provider = ScriptedProvider::new(Script::Outcomes(vec![delivered("1"), unregistered()]));
    let token_store = ObservedTokenStore::new();
    token_store.insert_user("alice", &["alice-phone-1", "alice-tablet"]).await;
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider.clone(), token_store.clone(), requests.clone()));
    let handler = UserNotificationHandler::new(engine, token_store.clone(), requests.clone(), 500);

    let outcome = handler
        .handle(DocumentCreatedEvent::new("n-1", user_notification("alice")))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.notification_id, "n-1");
    // Token sets are ordered, so the tablet token is second.
    assert_eq!(
        provider.calls()[0].tokens,
        vec![DeviceToken::new("alice-phone-1"), DeviceToken::new("alice-tablet")]
    );
    assert_eq!(token_store.tokens_of("alice").await, vec!["alice-phone-1".to_string()]);

    let stored = requests.get_request("n-1").await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Delivered);
}

#[tokio::test]
async fn test_user_notification_for_unknown_user_records_an_error() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let token_store = ObservedTokenStore::new();
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider.clone(), token_store.clone(), requests.clone()));
    let handler = UserNotificationHandler::new(engine, token_store, requests.clone(), 500);

    let outcome = handler
        .handle(DocumentCreatedEvent::new("n-2", user_notification("ghost")))
        .await;

    assert!(!outcome.success);
    assert!(outcome.error.unwrap().contains("ghost"));
    assert_eq!(provider.call_count(), 0);
    let stored = requests.get_request("n-2").await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Error);
}

#[tokio::test]
async fn test_user_notification_for_user_without_tokens_records_an_error() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let token_store = ObservedTokenStore::new();
    token_store.insert_user("bob", &[]).await;
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider.clone(), token_store.clone(), requests.clone()));
    let handler = UserNotificationHandler::new(engine, token_store, requests, 500);

    let outcome = handler
        .handle(DocumentCreatedEvent::new("n-3", user_notification("bob")))
        .await;

    assert!(!outcome.success);
    assert_eq!(provider.call_count(), 0);
}

#[tokio::test]
async fn test_user_notification_redelivery_is_not_sent_twice() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let token_store = ObservedTokenStore::new();
    token_store.insert_user("dana", &["dana-phone-1"]).await;
    let requests = Arc::new(InMemoryRequestStore::new());
    let engine = Arc::new(build_engine(provider.clone(), token_store.clone(), requests.clone()));
    let handler = UserNotificationHandler::new(engine, token_store, requests.clone(), 500);

    let first = handler
        .handle(DocumentCreatedEvent::new("n-4", user_notification("dana")))
        .await;
    let second = handler
        .handle(DocumentCreatedEvent::new("n-4", user_notification("dana")))
        .await;

    assert!(first.success);
    assert_eq!(second, first);
    assert_eq!(provider.call_count(), 1);
    let stored = requests.get_request("n-4").await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Delivered);
}

#[tokio::test]
async fn test_user_notification_resumes_a_pending_request() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let token_store = ObservedTokenStore::new();
    token_store.insert_user("erin", &["erin-phone-1"]).await;
    let requests = Arc::new(InMemoryRequestStore::new());
    // A previous delivery stored the request but never dispatched it.
    let pending = NotificationRequest::new(
        "n-5",
        tokens(&["erin-phone-1"]),
        UserNotificationHandler::payload_for("n-5", &user_notification("erin")),
    );
    requests.insert_request(pending).await.unwrap();
    let engine = Arc::new(build_engine(provider.clone(), token_store.clone(), requests.clone()));
    let handler = UserNotificationHandler::new(engine, token_store, requests.clone(), 500);

    let outcome = handler
        .handle(DocumentCreatedEvent::new("n-5", user_notification("erin")))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.success_count, 1);
    assert_eq!(provider.call_count(), 1);
    let stored = requests.get_request("n-5").await.unwrap().unwrap();
    assert_eq!(stored.status, NotificationStatus::Delivered);
}

#[tokio::test]
async fn test_user_notification_store_failure_is_an_unsuccessful_outcome() {
    let provider = ScriptedProvider::new(Script::AllSucceed);
    let token_store = ObservedTokenStore::new();
    token_store.insert_user("frank", &["frank-phone-1"]).await;
    let requests = UnavailableRequestStore::new();
    let engine = Arc::new(build_engine(provider.clone(), token_store.clone(), requests.clone()));
    let handler = UserNotificationHandler::new(engine, token_store, requests, 500);

    let outcome = handler
        .handle(DocumentCreatedEvent::new("n-6", user_notification("frank")))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.notification_id, "n-6");
    assert!(outcome.error.unwrap().contains("connection refused"));
    assert_eq!(provider.call_count(), 0);
}
