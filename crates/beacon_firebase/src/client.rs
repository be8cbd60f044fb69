//! Firebase Cloud Messaging client module
//!
//! FCM HTTP v1 has no multicast endpoint, so [`FirebaseClient`] implements the
//! multicast contract by issuing one `messages:send` request per token with bounded
//! concurrency and collecting the answers in token order. v1 error statuses are
//! translated to the `messaging/*` codes the dispatch core classifies.

use beacon_common::models::{
    DeliveryOutcome, DeviceToken, MulticastMessage, MulticastResponse, PlatformOptions,
};
use beacon_common::{BoxFuture, DeliveryError, DeliveryProvider};
use beacon_config::FirebaseConfig;
use futures_util::stream::{self, StreamExt};
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{AccessTokenSource, ServiceAccountTokenSource};

/// Default FCM endpoint host.
pub const FCM_BASE_URL: &str = "https://fcm.googleapis.com";

/// Number of in-flight `messages:send` requests per multicast.
pub const DEFAULT_SEND_CONCURRENCY: usize = 32;

/// Errors that can occur when interacting with the Firebase Cloud Messaging API
#[derive(Error, Debug)]
pub enum FirebaseError {
    /// Error during authentication with Firebase
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Error during HTTP request to Firebase API
    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Missing required configuration
    #[error("Missing configuration: {0}")]
    ConfigError(String),

    /// Error returned by the Firebase API
    #[error("Firebase API error: {code}: {message}")]
    ApiError { code: String, message: String },
}

impl From<FirebaseError> for DeliveryError {
    fn from(err: FirebaseError) -> Self {
        match err {
            FirebaseError::AuthError(msg) => DeliveryError::Auth(msg),
            FirebaseError::RequestError(e) => DeliveryError::Transport(e.to_string()),
            FirebaseError::ConfigError(msg) => DeliveryError::Config(msg),
            FirebaseError::ApiError { code, message } => DeliveryError::Api { code, message },
        }
    }
}

/// A message to be sent via Firebase Cloud Messaging
///
/// Top-level envelope of the FCM HTTP v1 `messages:send` body.
#[derive(Debug, Serialize)]
pub struct FcmMessage {
    pub message: Message,
}

/// The message payload for a single device.
#[derive(Debug, Serialize)]
pub struct Message {
    pub token: String,
    pub notification: Notification,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
}

/// The notification to be displayed on the user's device
#[derive(Debug, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct AndroidConfig {
    pub priority: String,
    pub notification: AndroidNotification,
}

#[derive(Debug, Serialize)]
pub struct AndroidNotification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub default_sound: bool,
    pub default_vibrate_timings: bool,
}

#[derive(Debug, Serialize)]
pub struct ApnsConfig {
    pub payload: ApnsPayload,
}

#[derive(Debug, Serialize)]
pub struct ApnsPayload {
    pub aps: Aps,
}

#[derive(Debug, Serialize)]
pub struct Aps {
    pub sound: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(rename = "content-available")]
    pub content_available: u8,
}

/// Successful `messages:send` answer.
#[derive(Debug, Deserialize)]
pub struct FcmResponse {
    /// "projects/{project_id}/messages/{message_id}"
    pub name: String,
}

/// Error envelope returned by Google APIs.
#[derive(Debug, Deserialize)]
struct FcmErrorEnvelope {
    error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
struct FcmErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct FcmErrorDetail {
    #[serde(rename = "@type", default)]
    type_url: String,
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

/// Maps an FCM v1 error code (or canonical status) to a `messaging/*` code.
///
/// `INVALID_ARGUMENT` is ambiguous in v1: it covers both malformed tokens and
/// malformed payloads, so the message text decides.
pub fn map_fcm_error_code(fcm_code: &str, message: &str) -> String {
    let mapped = match fcm_code {
        "UNREGISTERED" | "NOT_FOUND" => "registration-token-not-registered",
        "INVALID_ARGUMENT" => {
            if message.to_lowercase().contains("registration token") {
                "invalid-registration-token"
            } else {
                "invalid-argument"
            }
        }
        "QUOTA_EXCEEDED" | "RESOURCE_EXHAUSTED" => "quota-exceeded",
        "UNAVAILABLE" => "server-unavailable",
        "INTERNAL" => "internal-error",
        "SENDER_ID_MISMATCH" | "PERMISSION_DENIED" => "mismatched-credential",
        "THIRD_PARTY_AUTH_ERROR" => "third-party-auth-error",
        "UNAUTHENTICATED" => "authentication-error",
        _ => "unknown-error",
    };
    format!("messaging/{}", mapped)
}

/// Client for interacting with the Firebase Cloud Messaging API
pub struct FirebaseClient {
    /// HTTP client for making requests to the FCM API
    client: Client,

    /// Configuration for Firebase, including project ID and service account key path
    config: FirebaseConfig,

    token_source: Arc<dyn AccessTokenSource>,

    concurrency: usize,
}

impl FirebaseClient {
    /// Creates a client that authenticates with the configured service account key.
    pub fn new(config: FirebaseConfig) -> Self {
        let token_source = Arc::new(ServiceAccountTokenSource::new(config.clone()));
        Self::with_token_source(config, token_source)
    }

    pub fn with_token_source(config: FirebaseConfig, token_source: Arc<dyn AccessTokenSource>) -> Self {
        Self {
            client: Client::new(),
            config,
            token_source,
            concurrency: DEFAULT_SEND_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    fn send_url(&self) -> Result<String, FirebaseError> {
        let project_id = self.config.project_id.as_deref().ok_or_else(|| {
            FirebaseError::ConfigError("Missing project_id in FirebaseConfig".to_string())
        })?;
        let base = self
            .config
            .api_base_url
            .as_deref()
            .unwrap_or(FCM_BASE_URL)
            .trim_end_matches('/');
        Ok(format!("{}/v1/projects/{}/messages:send", base, project_id))
    }

    /// Sends a single FCM message.
    ///
    /// Returns `Ok(outcome)` whenever FCM answered, including rejections. `Err` is
    /// reserved for failures where FCM never judged the token (transport errors,
    /// rejected credentials).
    pub async fn send_message(
        &self,
        url: &str,
        bearer: &str,
        message: &FcmMessage,
    ) -> Result<DeliveryOutcome, FirebaseError> {
        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", bearer))
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let fcm_response: FcmResponse = response.json().await?;
            return Ok(DeliveryOutcome::delivered(fcm_response.name));
        }

        let error_text = response.text().await?;
        let (fcm_code, message_text) = match serde_json::from_str::<FcmErrorEnvelope>(&error_text) {
            Ok(envelope) => {
                let detail_code = envelope
                    .error
                    .details
                    .iter()
                    .filter(|d| d.type_url.contains("FcmError"))
                    .find_map(|d| d.error_code.clone());
                let code = detail_code
                    .or(envelope.error.status)
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                (code, envelope.error.message)
            }
            Err(_) => ("UNKNOWN".to_string(), error_text),
        };

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FirebaseError::AuthError(message_text));
        }

        Ok(DeliveryOutcome::rejected(
            map_fcm_error_code(&fcm_code, &message_text),
            message_text,
        ))
    }

    async fn multicast(&self, message: MulticastMessage) -> Result<MulticastResponse, FirebaseError> {
        let url = self.send_url()?;
        let bearer = self.token_source.access_token().await?;

        let url = url.as_str();
        let bearer = bearer.as_str();
        let message = &message;

        let sends: Vec<_> = message
            .tokens
            .iter()
            .map(|token| {
                let fcm_message = build_fcm_message(token, message);
                async move { self.send_message(url, bearer, &fcm_message).await }
            })
            .collect();
        let results: Vec<Result<DeliveryOutcome, FirebaseError>> = stream::iter(sends)
            .buffered(self.concurrency)
            .collect()
            .await;

        // FCM never judged a single token: treat it as a failure of the whole batch.
        if !results.is_empty() && results.iter().all(|r| r.is_err()) {
            let first = results.into_iter().find_map(|r| r.err());
            return Err(first.unwrap_or_else(|| {
                FirebaseError::ApiError {
                    code: "messaging/unknown-error".to_string(),
                    message: "every send failed".to_string(),
                }
            }));
        }

        let outcomes = results
            .into_iter()
            .zip(message.tokens.iter())
            .map(|(result, token)| match result {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("FCM send to {} failed before delivery: {}", token, err);
                    let code = DeliveryError::from(err);
                    DeliveryOutcome::rejected(code.code(), code.to_string())
                }
            })
            .collect();

        Ok(MulticastResponse::from_outcomes(outcomes))
    }
}

impl DeliveryProvider for FirebaseClient {
    fn send_multicast(
        &self,
        message: MulticastMessage,
    ) -> BoxFuture<'_, MulticastResponse, DeliveryError> {
        Box::pin(async move {
            debug!("Sending FCM multicast to {} tokens", message.tokens.len());
            self.multicast(message).await.map_err(DeliveryError::from)
        })
    }
}

fn build_fcm_message(token: &DeviceToken, message: &MulticastMessage) -> FcmMessage {
    FcmMessage {
        message: Message {
            token: token.as_str().to_string(),
            notification: Notification {
                title: message.title.clone(),
                body: message.body.clone(),
            },
            data: message.data.clone(),
            android: android_config(&message.platform),
            apns: apns_config(&message.platform),
        },
    }
}

fn android_config(platform: &PlatformOptions) -> Option<AndroidConfig> {
    platform.android.as_ref().map(|a| AndroidConfig {
        priority: a.priority.to_uppercase(),
        notification: AndroidNotification {
            icon: a.icon.clone(),
            color: a.color.clone(),
            default_sound: a.default_sound,
            default_vibrate_timings: a.default_vibrate_timings,
        },
    })
}

fn apns_config(platform: &PlatformOptions) -> Option<ApnsConfig> {
    platform.apns.as_ref().map(|a| ApnsConfig {
        payload: ApnsPayload {
            aps: Aps {
                sound: a.sound.clone(),
                badge: a.badge,
                content_available: u8::from(a.content_available),
            },
        },
    })
}
