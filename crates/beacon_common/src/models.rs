// --- File: crates/beacon_common/src/models.rs ---

// Data structures shared by the dispatch core, the stores and the delivery provider.

use beacon_config::PlatformConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{validation_error, BeaconError};

/// Number of leading token characters kept when a token is redacted.
pub const REDACTED_TOKEN_PREFIX_LEN: usize = 10;

/// Error codes the provider uses for tokens that will never accept delivery again.
pub const INVALID_REGISTRATION_TOKEN: &str = "messaging/invalid-registration-token";
pub const REGISTRATION_TOKEN_NOT_REGISTERED: &str = "messaging/registration-token-not-registered";

/// Returns true when `code` marks a token that should be purged from storage.
///
/// Codes are accepted with or without the `messaging/` namespace.
pub fn is_permanently_invalid(code: &str) -> bool {
    let bare = code.strip_prefix("messaging/").unwrap_or(code);
    matches!(
        bare,
        "invalid-registration-token" | "registration-token-not-registered"
    )
}

/// Opaque device address issued by the push provider.
///
/// `Display` and `Debug` both print the redacted form, so a token can be passed to
/// `tracing` macros without leaking it. Use [`DeviceToken::as_str`] for the wire.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// First ten characters followed by `...`.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(REDACTED_TOKEN_PREFIX_LEN).collect();
        format!("{}...", prefix)
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceToken({})", self.redacted())
    }
}

impl From<String> for DeviceToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<&str> for DeviceToken {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

/// The user-visible part of a push message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Custom key-value data delivered to the app alongside the notification.
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Checks the payload before it reaches the provider.
    ///
    /// Title and body must be non-blank. Data keys must be non-empty and must not use
    /// the names FCM reserves for itself (`from`, `message_type`, `google.*`, `gcm.*`).
    pub fn validate(&self) -> Result<(), BeaconError> {
        if self.title.trim().is_empty() {
            return Err(validation_error("notification title is required"));
        }
        if self.body.trim().is_empty() {
            return Err(validation_error("notification body is required"));
        }
        for key in self.data.keys() {
            if key.is_empty() {
                return Err(validation_error("data keys must not be empty"));
            }
            if key == "from"
                || key == "message_type"
                || key.starts_with("google.")
                || key.starts_with("gcm.")
            {
                return Err(validation_error(format!("data key '{}' is reserved", key)));
            }
        }
        Ok(())
    }
}

/// Lifecycle of a notification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    #[default]
    Pending,
    Delivered,
    Failed,
    Error,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Error => "error",
        }
    }

    /// Delivered and failed requests reached the provider and carry counts.
    pub fn is_settled_delivery(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Delivered | NotificationStatus::Failed
        )
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = BeaconError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "delivered" => Ok(NotificationStatus::Delivered),
            "failed" => Ok(NotificationStatus::Failed),
            "error" => Ok(NotificationStatus::Error),
            other => Err(BeaconError::ParseError(format!(
                "unknown notification status: {}",
                other
            ))),
        }
    }
}

/// Label used for the batch field of a batch-level error descriptor.
pub const ALL_TOKENS: &str = "All tokens";

/// One failure recorded on a notification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(untagged)]
pub enum ErrorDetail {
    /// A single token was rejected. `token` is always the redacted form.
    Token {
        token: String,
        code: String,
        message: String,
    },
    /// The provider call failed for the whole batch.
    Batch {
        batch: String,
        code: String,
        message: String,
    },
}

impl ErrorDetail {
    pub fn for_token(token: &DeviceToken, code: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorDetail::Token {
            token: token.redacted(),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn for_batch(code: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorDetail::Batch {
            batch: ALL_TOKENS.to_string(),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            ErrorDetail::Token { code, .. } | ErrorDetail::Batch { code, .. } => code,
        }
    }
}

/// A push request as stored by the request store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationRequest {
    pub id: String,
    /// Target tokens in caller order. Not deduplicated.
    #[serde(default)]
    pub tokens: Vec<DeviceToken>,
    pub payload: NotificationPayload,
    #[serde(default)]
    pub status: NotificationStatus,
    #[serde(default)]
    pub success_count: Option<usize>,
    #[serde(default)]
    pub failure_count: Option<usize>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_details: Vec<ErrorDetail>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationRequest {
    pub fn new(id: impl Into<String>, tokens: Vec<DeviceToken>, payload: NotificationPayload) -> Self {
        Self {
            id: id.into(),
            tokens,
            payload,
            status: NotificationStatus::Pending,
            success_count: None,
            failure_count: None,
            error: None,
            error_details: Vec::new(),
            created_at: Utc::now(),
            updated_at: None,
            sent_at: None,
        }
    }
}

/// A merge patch for a stored [`NotificationRequest`].
///
/// `None` fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: NotificationStatus,
    pub updated_at: DateTime<Utc>,
    pub success_count: Option<usize>,
    pub failure_count: Option<usize>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub error_details: Option<Vec<ErrorDetail>>,
}

impl StatusUpdate {
    pub fn apply_to(&self, request: &mut NotificationRequest) {
        request.status = self.status;
        request.updated_at = Some(self.updated_at);
        if let Some(count) = self.success_count {
            request.success_count = Some(count);
        }
        if let Some(count) = self.failure_count {
            request.failure_count = Some(count);
        }
        if let Some(sent_at) = self.sent_at {
            request.sent_at = Some(sent_at);
        }
        if let Some(error) = &self.error {
            request.error = Some(error.clone());
        }
        if let Some(details) = &self.error_details {
            request.error_details = details.clone();
        }
    }
}

/// Per-user set of device tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTokenSet {
    pub user_id: String,
    pub tokens: BTreeSet<DeviceToken>,
    pub last_token_update: Option<DateTime<Utc>>,
}

impl UserTokenSet {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tokens: BTreeSet::new(),
            last_token_update: None,
        }
    }

    pub fn contains(&self, token: &DeviceToken) -> bool {
        self.tokens.contains(token)
    }
}

/// Android delivery options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AndroidOptions {
    pub priority: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub default_sound: bool,
    pub default_vibrate_timings: bool,
}

/// APNs delivery options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApnsOptions {
    pub sound: String,
    pub badge: Option<u32>,
    pub content_available: bool,
}

/// Platform-specific presentation attached to a multicast.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlatformOptions {
    pub android: Option<AndroidOptions>,
    pub apns: Option<ApnsOptions>,
}

impl PlatformOptions {
    pub fn from_config(config: &PlatformConfig) -> Self {
        Self {
            android: Some(AndroidOptions {
                priority: config.android_priority.clone(),
                icon: config.android_icon.clone(),
                color: config.android_color.clone(),
                default_sound: true,
                default_vibrate_timings: true,
            }),
            apns: Some(ApnsOptions {
                sound: config.apns_sound.clone(),
                badge: config.apns_badge,
                content_available: true,
            }),
        }
    }
}

/// One provider call addressing many tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct MulticastMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
    pub tokens: Vec<DeviceToken>,
    pub platform: PlatformOptions,
}

impl MulticastMessage {
    pub fn new(tokens: Vec<DeviceToken>, payload: &NotificationPayload, platform: PlatformOptions) -> Self {
        Self {
            title: payload.title.clone(),
            body: payload.body.clone(),
            data: payload.data.clone(),
            tokens,
            platform,
        }
    }
}

/// Error reported by the provider for a single token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

/// Result of delivering to one token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeliveryOutcome {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<ProviderError>,
}

impl DeliveryOutcome {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(ProviderError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Provider answer to a multicast. `responses[i]` belongs to `tokens[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticastResponse {
    pub success_count: usize,
    pub failure_count: usize,
    pub responses: Vec<DeliveryOutcome>,
}

impl MulticastResponse {
    pub fn from_outcomes(responses: Vec<DeliveryOutcome>) -> Self {
        let success_count = responses.iter().filter(|r| r.success).count();
        Self {
            success_count,
            failure_count: responses.len() - success_count,
            responses,
        }
    }
}

/// A document-created event delivered by the triggering platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentCreatedEvent<T> {
    pub document_id: String,
    pub data: T,
    pub occurred_at: DateTime<Utc>,
}

impl<T> DocumentCreatedEvent<T> {
    pub fn new(document_id: impl Into<String>, data: T) -> Self {
        Self {
            document_id: document_id.into(),
            data,
            occurred_at: Utc::now(),
        }
    }
}

/// A notification addressed to a user rather than to explicit tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserNotification {
    pub user_id: String,
    pub title: String,
    pub body: String,
    /// Defaults to `general` when absent.
    #[serde(default, rename = "type")]
    pub notification_type: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}
