//! Test fixtures for dispatch tests
//!
//! Scripted provider and fault-injecting store wrappers around the in-memory
//! stores from `beacon-db`.
#![allow(dead_code)]

use beacon_common::models::{
    DeliveryOutcome, DeviceToken, MulticastMessage, MulticastResponse, NotificationPayload,
    NotificationRequest, StatusUpdate, UserTokenSet,
};
use beacon_common::{BoxFuture, DeliveryError, DeliveryProvider, RequestStore, StoreError, TokenStore};
use beacon_db::{InMemoryRequestStore, InMemoryTokenStore};
use beacon_dispatch::{DispatchEngine, RetryConfig, StatusRecorder, TokenReconciler};
use beacon_common::models::PlatformOptions;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted provider answers.
#[derive(Clone)]
pub enum Script {
    Outcomes(Vec<DeliveryOutcome>),
    /// Answers with a success for every token.
    AllSucceed,
    Fail(DeliveryError),
    /// Never answers; exercises the provider timeout.
    Hang,
}

pub struct ScriptedProvider {
    script: Script,
    calls: Mutex<Vec<MulticastMessage>>,
}

impl ScriptedProvider {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<MulticastMessage> {
        self.calls.lock().unwrap().clone()
    }
}

impl DeliveryProvider for ScriptedProvider {
    fn send_multicast(
        &self,
        message: MulticastMessage,
    ) -> BoxFuture<'_, MulticastResponse, DeliveryError> {
        let token_count = message.tokens.len();
        self.calls.lock().unwrap().push(message);
        let script = self.script.clone();
        Box::pin(async move {
            match script {
                Script::Outcomes(outcomes) => Ok(MulticastResponse::from_outcomes(outcomes)),
                Script::AllSucceed => Ok(MulticastResponse::from_outcomes(
                    (0..token_count)
                        .map(|i| DeliveryOutcome::delivered(format!("projects/test/messages/{}", i)))
                        .collect(),
                )),
                Script::Fail(err) => Err(err),
                Script::Hang => {
                    std::future::pending::<()>().await;
                    Err(DeliveryError::Transport("unreachable".to_string()))
                }
            }
        })
    }
}

/// Token store wrapper that records lookups and can fail removals.
pub struct ObservedTokenStore {
    inner: InMemoryTokenStore,
    lookups: Mutex<Vec<DeviceToken>>,
    remove_calls: AtomicUsize,
    failing_removals: AtomicUsize,
}

impl ObservedTokenStore {
    pub fn new() -> Arc<Self> {
        Self::failing_first(0)
    }

    /// The first `failures` removal writes fail with a backend error.
    pub fn failing_first(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryTokenStore::new(),
            lookups: Mutex::new(Vec::new()),
            remove_calls: AtomicUsize::new(0),
            failing_removals: AtomicUsize::new(failures),
        })
    }

    pub async fn insert_user(&self, user_id: &str, tokens: &[&str]) {
        self.inner.insert_user(user_id, tokens).await;
    }

    /// Raw token values that were looked up, in call order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.as_str().to_string())
            .collect()
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    pub async fn tokens_of(&self, user_id: &str) -> Vec<String> {
        self.inner
            .tokens_for_user(user_id)
            .await
            .unwrap()
            .map(|set| set.tokens.iter().map(|t| t.as_str().to_string()).collect())
            .unwrap_or_default()
    }
}

impl TokenStore for ObservedTokenStore {
    fn find_users_with_token<'a>(
        &'a self,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, Vec<String>, StoreError> {
        self.lookups.lock().unwrap().push(token.clone());
        self.inner.find_users_with_token(token)
    }

    fn remove_token_from_users<'a>(
        &'a self,
        token: &'a DeviceToken,
        user_ids: &'a [String],
        stamped_at: DateTime<Utc>,
    ) -> BoxFuture<'a, usize, StoreError> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_removals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Box::pin(async { Err(StoreError::Backend("write conflict".to_string())) });
        }
        self.inner.remove_token_from_users(token, user_ids, stamped_at)
    }

    fn tokens_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Option<UserTokenSet>, StoreError> {
        self.inner.tokens_for_user(user_id)
    }

    fn add_token<'a>(
        &'a self,
        user_id: &'a str,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, UserTokenSet, StoreError> {
        self.inner.add_token(user_id, token)
    }
}

/// Request store whose status writes always fail.
pub struct BrokenRequestStore {
    inner: InMemoryRequestStore,
}

impl BrokenRequestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryRequestStore::new(),
        })
    }
}

impl RequestStore for BrokenRequestStore {
    fn insert_request(
        &self,
        request: NotificationRequest,
    ) -> BoxFuture<'_, NotificationRequest, StoreError> {
        self.inner.insert_request(request)
    }

    fn get_request<'a>(
        &'a self,
        request_id: &'a str,
    ) -> BoxFuture<'a, Option<NotificationRequest>, StoreError> {
        self.inner.get_request(request_id)
    }

    fn apply_status_update<'a>(
        &'a self,
        _request_id: &'a str,
        _update: StatusUpdate,
    ) -> BoxFuture<'a, (), StoreError> {
        Box::pin(async { Err(StoreError::Backend("database is locked".to_string())) })
    }
}

/// Request store that is unreachable for every call.
pub struct UnavailableRequestStore;

impl UnavailableRequestStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl RequestStore for UnavailableRequestStore {
    fn insert_request(
        &self,
        _request: NotificationRequest,
    ) -> BoxFuture<'_, NotificationRequest, StoreError> {
        Box::pin(async { Err(StoreError::Backend("connection refused".to_string())) })
    }

    fn get_request<'a>(
        &'a self,
        _request_id: &'a str,
    ) -> BoxFuture<'a, Option<NotificationRequest>, StoreError> {
        Box::pin(async { Err(StoreError::Backend("connection refused".to_string())) })
    }

    fn apply_status_update<'a>(
        &'a self,
        _request_id: &'a str,
        _update: StatusUpdate,
    ) -> BoxFuture<'a, (), StoreError> {
        Box::pin(async { Err(StoreError::Backend("connection refused".to_string())) })
    }
}

pub fn tokens(values: &[&str]) -> Vec<DeviceToken> {
    values.iter().map(|v| DeviceToken::new(*v)).collect()
}

pub fn payload() -> NotificationPayload {
    NotificationPayload::new("Blood drive today", "Donors needed at the city hall")
        .with_data("campaign", "spring")
}

pub fn invalid_token() -> DeliveryOutcome {
    DeliveryOutcome::rejected(
        "messaging/invalid-registration-token",
        "The registration token is not a valid FCM registration token",
    )
}

pub fn unregistered() -> DeliveryOutcome {
    DeliveryOutcome::rejected(
        "messaging/registration-token-not-registered",
        "Requested entity was not found.",
    )
}

pub fn quota_exceeded() -> DeliveryOutcome {
    DeliveryOutcome::rejected("messaging/quota-exceeded", "Quota exceeded")
}

pub fn delivered(id: &str) -> DeliveryOutcome {
    DeliveryOutcome::delivered(format!("projects/test/messages/{}", id))
}

pub fn build_engine(
    provider: Arc<dyn DeliveryProvider>,
    token_store: Arc<dyn TokenStore>,
    request_store: Arc<dyn RequestStore>,
) -> DispatchEngine {
    DispatchEngine::new(
        provider,
        TokenReconciler::new(token_store, RetryConfig::new(3, Duration::from_millis(1))),
        StatusRecorder::new(request_store),
        PlatformOptions::default(),
        Duration::from_millis(200),
    )
}

/// Stores a pending request with the given tokens and returns it.
pub async fn seed_request(
    store: &InMemoryRequestStore,
    id: &str,
    token_values: &[&str],
) -> NotificationRequest {
    let request = NotificationRequest::new(id, tokens(token_values), payload());
    store.insert_request(request).await.unwrap()
}
