//! Authentication module for Firebase Cloud Messaging
//!
//! FCM HTTP v1 requests carry an OAuth2 bearer token minted from a service account
//! key. The [`AccessTokenSource`] trait hides where that token comes from so the
//! client can run against an emulator or a mock server with a fixed token.

use beacon_common::BoxFuture;
use beacon_config::FirebaseConfig;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::debug;
use yup_oauth2::authenticator::DefaultAuthenticator;
use yup_oauth2::{read_service_account_key, ServiceAccountAuthenticator};

use crate::client::FirebaseError;

/// OAuth2 scope required by the FCM HTTP v1 API.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Supplies bearer tokens for FCM requests.
pub trait AccessTokenSource: Send + Sync {
    fn access_token(&self) -> BoxFuture<'_, String, FirebaseError>;
}

/// Mints tokens from the service account key referenced by `FirebaseConfig::key_path`.
///
/// The authenticator is built on first use and kept, so the key file is read once
/// and yup-oauth2 can serve cached tokens until they near expiry. A failed build is
/// not cached; the next call tries again.
pub struct ServiceAccountTokenSource {
    config: FirebaseConfig,
    authenticator: OnceCell<DefaultAuthenticator>,
}

impl ServiceAccountTokenSource {
    pub fn new(config: FirebaseConfig) -> Self {
        Self {
            config,
            authenticator: OnceCell::new(),
        }
    }

    async fn authenticator(&self) -> Result<&DefaultAuthenticator, FirebaseError> {
        self.authenticator
            .get_or_try_init(|| build_authenticator(&self.config))
            .await
    }
}

impl AccessTokenSource for ServiceAccountTokenSource {
    fn access_token(&self) -> BoxFuture<'_, String, FirebaseError> {
        Box::pin(async move {
            let auth = self.authenticator().await?;
            let auth_token = auth
                .token(&[FCM_SCOPE])
                .await
                .map_err(|e| FirebaseError::AuthError(e.to_string()))?;
            auth_token
                .token()
                .map(str::to_string)
                .ok_or_else(|| FirebaseError::AuthError("No token available".to_string()))
        })
    }
}

/// Hands out a fixed token. Meant for emulators and tests.
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl AccessTokenSource for StaticTokenSource {
    fn access_token(&self) -> BoxFuture<'_, String, FirebaseError> {
        let token = self.token.clone();
        Box::pin(async move { Ok(token) })
    }
}

/// Builds a service account authenticator for Firebase Cloud Messaging
///
/// # Errors
///
/// * The key_path is missing from the FirebaseConfig
/// * The service account key file cannot be read
/// * The authenticator cannot be constructed from the key
async fn build_authenticator(config: &FirebaseConfig) -> Result<DefaultAuthenticator, FirebaseError> {
    let key_path = config
        .key_path
        .as_deref()
        .ok_or_else(|| FirebaseError::AuthError("Missing key_path in FirebaseConfig".to_string()))?;

    debug!("Loading Firebase service account key from {}", key_path);
    let sa_key = read_service_account_key(Path::new(key_path))
        .await
        .map_err(|e| FirebaseError::AuthError(format!("cannot read service account key: {}", e)))?;

    ServiceAccountAuthenticator::builder(sa_key)
        .build()
        .await
        .map_err(|e| FirebaseError::AuthError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_path_is_an_auth_error() {
        let source = ServiceAccountTokenSource::new(FirebaseConfig {
            project_id: Some("demo".to_string()),
            key_path: None,
            api_base_url: None,
        });

        let err = source.access_token().await.unwrap_err();
        assert!(matches!(err, FirebaseError::AuthError(_)));
        assert!(err.to_string().contains("key_path"));
    }

    #[tokio::test]
    async fn test_failed_authenticator_build_is_retried_on_next_call() {
        let source = ServiceAccountTokenSource::new(FirebaseConfig {
            project_id: Some("demo".to_string()),
            key_path: Some("/nonexistent/beacon-service-account.json".to_string()),
            api_base_url: None,
        });

        let first = source.access_token().await.unwrap_err();
        let second = source.access_token().await.unwrap_err();

        assert!(matches!(first, FirebaseError::AuthError(_)));
        assert!(second.to_string().contains("cannot read service account key"));
        assert!(source.authenticator.get().is_none());
    }

    #[tokio::test]
    async fn test_static_source_returns_its_token() {
        let source = StaticTokenSource::new("fixed");
        assert_eq!(source.access_token().await.unwrap(), "fixed");
    }
}
