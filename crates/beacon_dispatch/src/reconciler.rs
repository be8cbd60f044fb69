//! Token reconciliation.
//!
//! Removes a token the provider reported as permanently invalid from every user
//! that still holds it. Removal across the matched users is a single atomic store
//! write, and removing an absent token is a no-op, so the operation can be repeated
//! safely after at-least-once trigger deliveries.

use beacon_common::models::DeviceToken;
use beacon_common::{StoreError, TokenStore};
use beacon_config::DispatchConfig;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::retry::{retry_async, RetryConfig};

/// Result of one reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReconcileResult {
    /// Users whose token set actually changed.
    pub users_updated: usize,
}

pub struct TokenReconciler {
    store: Arc<dyn TokenStore>,
    retry: RetryConfig,
}

impl TokenReconciler {
    pub fn new(store: Arc<dyn TokenStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub fn from_config(store: Arc<dyn TokenStore>, config: &DispatchConfig) -> Self {
        Self::new(
            store,
            RetryConfig::new(
                config.reconcile_max_attempts,
                Duration::from_millis(config.reconcile_backoff_ms),
            ),
        )
    }

    /// Removes `token` from every user whose set contains it.
    ///
    /// Zero matching users is a normal outcome. A failed removal write is retried
    /// with exponential backoff and surfaced once the attempt budget is spent.
    pub async fn reconcile(&self, token: &DeviceToken) -> Result<ReconcileResult, StoreError> {
        let user_ids = self.store.find_users_with_token(token).await?;
        if user_ids.is_empty() {
            debug!("Invalid token {} is not held by any user", token);
            return Ok(ReconcileResult::default());
        }

        let stamped_at = Utc::now();
        let users_updated = retry_async(&self.retry, is_transient, || {
            self.store
                .remove_token_from_users(token, &user_ids, stamped_at)
        })
        .await?;

        info!(
            "Removed invalid token {} from {} of {} users",
            token,
            users_updated,
            user_ids.len()
        );
        Ok(ReconcileResult { users_updated })
    }
}

fn is_transient(err: &StoreError) -> bool {
    matches!(err, StoreError::Backend(_))
}
