// --- File: crates/beacon_config/src/models.rs ---

use serde::{Deserialize, Serialize};

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8086,
        }
    }
}

// --- Logging Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, a daily rolling log file is written here as well as to stdout.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
        }
    }
}

// --- Database Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String, // e.g. sqlite:data/beacon.db, loaded via BEACON__DATABASE__URL
}

// --- Firebase Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct FirebaseConfig {
    pub project_id: Option<String>,
    pub key_path: Option<String>, // service account JSON
    /// Overrides https://fcm.googleapis.com, used against emulators and in tests.
    #[serde(default)]
    pub api_base_url: Option<String>,
}

// --- Dispatch Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchConfig {
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Largest token batch a single provider call accepts.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_reconcile_max_attempts")]
    pub reconcile_max_attempts: u32,
    #[serde(default = "default_reconcile_backoff_ms")]
    pub reconcile_backoff_ms: u64,
}

fn default_provider_timeout_secs() -> u64 {
    30
}

fn default_max_batch_size() -> usize {
    500
}

fn default_reconcile_max_attempts() -> u32 {
    3
}

fn default_reconcile_backoff_ms() -> u64 {
    100
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout_secs(),
            max_batch_size: default_max_batch_size(),
            reconcile_max_attempts: default_reconcile_max_attempts(),
            reconcile_backoff_ms: default_reconcile_backoff_ms(),
        }
    }
}

// --- Platform Config ---
// Android and APNs presentation attached to every outgoing message.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PlatformConfig {
    #[serde(default)]
    pub android_icon: Option<String>,
    #[serde(default)]
    pub android_color: Option<String>,
    #[serde(default = "default_android_priority")]
    pub android_priority: String,
    #[serde(default = "default_apns_sound")]
    pub apns_sound: String,
    #[serde(default)]
    pub apns_badge: Option<u32>,
}

fn default_android_priority() -> String {
    "high".to_string()
}

fn default_apns_sound() -> String {
    "default".to_string()
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            android_icon: None,
            android_color: None,
            android_priority: default_android_priority(),
            apns_sound: default_apns_sound(),
            apns_badge: None,
        }
    }
}

// --- Callable Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CallableConfig {
    pub api_key: Option<String>, // usually "secret_from_env" -> CALLABLE_API_KEY
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    // --- Optional Configurations ---
    #[serde(default)]
    pub database: Option<DatabaseConfig>, // absent -> in-memory stores
    #[serde(default)]
    pub firebase: Option<FirebaseConfig>,
    #[serde(default)]
    pub callable: Option<CallableConfig>,
}
