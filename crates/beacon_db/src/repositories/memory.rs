//! In-memory stores
//!
//! Used when no `database` section is configured and by tests. State lives behind
//! a single `RwLock`, so multi-user removals are atomic.

use beacon_common::models::{DeviceToken, NotificationRequest, StatusUpdate, UserTokenSet};
use beacon_common::{BoxFuture, RequestStore, StoreError, TokenStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    users: RwLock<HashMap<String, UserTokenSet>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a user with the given tokens, replacing any previous set.
    pub async fn insert_user(&self, user_id: &str, tokens: &[&str]) {
        let mut set = UserTokenSet::new(user_id);
        set.tokens = tokens.iter().map(|t| DeviceToken::new(*t)).collect();
        self.users.write().await.insert(user_id.to_string(), set);
    }
}

impl TokenStore for InMemoryTokenStore {
    fn find_users_with_token<'a>(
        &'a self,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, Vec<String>, StoreError> {
        Box::pin(async move {
            let users = self.users.read().await;
            let mut ids: Vec<String> = users
                .values()
                .filter(|set| set.contains(token))
                .map(|set| set.user_id.clone())
                .collect();
            ids.sort();
            Ok(ids)
        })
    }

    fn remove_token_from_users<'a>(
        &'a self,
        token: &'a DeviceToken,
        user_ids: &'a [String],
        stamped_at: DateTime<Utc>,
    ) -> BoxFuture<'a, usize, StoreError> {
        Box::pin(async move {
            let mut users = self.users.write().await;
            let mut changed = 0;
            for user_id in user_ids {
                if let Some(set) = users.get_mut(user_id) {
                    if set.tokens.remove(token) {
                        set.last_token_update = Some(stamped_at);
                        changed += 1;
                    }
                }
            }
            Ok(changed)
        })
    }

    fn tokens_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Option<UserTokenSet>, StoreError> {
        Box::pin(async move { Ok(self.users.read().await.get(user_id).cloned()) })
    }

    fn add_token<'a>(
        &'a self,
        user_id: &'a str,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, UserTokenSet, StoreError> {
        Box::pin(async move {
            let mut users = self.users.write().await;
            let set = users
                .entry(user_id.to_string())
                .or_insert_with(|| UserTokenSet::new(user_id));
            if set.tokens.insert(token.clone()) {
                set.last_token_update = Some(Utc::now());
            }
            Ok(set.clone())
        })
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<String, NotificationRequest>>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RequestStore for InMemoryRequestStore {
    fn insert_request(
        &self,
        request: NotificationRequest,
    ) -> BoxFuture<'_, NotificationRequest, StoreError> {
        Box::pin(async move {
            let mut requests = self.requests.write().await;
            if requests.contains_key(&request.id) {
                return Err(StoreError::Backend(format!(
                    "notification request {} already exists",
                    request.id
                )));
            }
            requests.insert(request.id.clone(), request.clone());
            Ok(request)
        })
    }

    fn get_request<'a>(
        &'a self,
        request_id: &'a str,
    ) -> BoxFuture<'a, Option<NotificationRequest>, StoreError> {
        Box::pin(async move { Ok(self.requests.read().await.get(request_id).cloned()) })
    }

    fn apply_status_update<'a>(
        &'a self,
        request_id: &'a str,
        update: StatusUpdate,
    ) -> BoxFuture<'a, (), StoreError> {
        Box::pin(async move {
            let mut requests = self.requests.write().await;
            let request = requests.get_mut(request_id).ok_or_else(|| {
                StoreError::NotFound(format!("notification request {}", request_id))
            })?;
            update.apply_to(request);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::models::{NotificationPayload, NotificationStatus};

    #[tokio::test]
    async fn test_remove_only_counts_users_that_held_the_token() {
        let store = InMemoryTokenStore::new();
        store.insert_user("u1", &["t1", "t2"]).await;
        store.insert_user("u2", &["t2"]).await;

        let token = DeviceToken::new("t1");
        let ids = vec!["u1".to_string(), "u2".to_string(), "ghost".to_string()];
        let changed = store
            .remove_token_from_users(&token, &ids, Utc::now())
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let u2 = store.tokens_for_user("u2").await.unwrap().unwrap();
        assert!(u2.last_token_update.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = InMemoryRequestStore::new();
        let request = NotificationRequest::new("r1", vec![], NotificationPayload::new("t", "b"));
        store.insert_request(request.clone()).await.unwrap();
        assert!(store.insert_request(request).await.is_err());
    }

    #[tokio::test]
    async fn test_update_unknown_request_is_not_found() {
        let store = InMemoryRequestStore::new();
        let update = StatusUpdate {
            status: NotificationStatus::Delivered,
            updated_at: Utc::now(),
            success_count: Some(1),
            failure_count: Some(0),
            sent_at: None,
            error: None,
            error_details: None,
        };
        let err = store.apply_status_update("missing", update).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
