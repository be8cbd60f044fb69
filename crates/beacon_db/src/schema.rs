//! Table definitions for the Beacon stores
//!
//! Timestamps are stored as RFC 3339 text and structured columns as JSON text,
//! because the `Any` driver cannot decode `DateTime<Utc>` or JSON values directly.

use crate::client::DbClient;
use crate::error::DbError;
use tracing::{debug, info};

const CREATE_USERS: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        user_id TEXT PRIMARY KEY,
        last_token_update TEXT,
        created_at TEXT NOT NULL
    )
"#;

const CREATE_USER_DEVICE_TOKENS: &str = r#"
    CREATE TABLE IF NOT EXISTS user_device_tokens (
        user_id TEXT NOT NULL,
        token TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(user_id, token)
    )
"#;

const CREATE_TOKEN_INDEX: &str = r#"
    CREATE INDEX IF NOT EXISTS idx_user_device_tokens_token
    ON user_device_tokens (token)
"#;

const CREATE_NOTIFICATION_REQUESTS: &str = r#"
    CREATE TABLE IF NOT EXISTS notification_requests (
        id TEXT PRIMARY KEY,
        tokens TEXT NOT NULL,
        payload TEXT NOT NULL,
        status TEXT NOT NULL,
        success_count INTEGER,
        failure_count INTEGER,
        error TEXT,
        error_details TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT,
        sent_at TEXT
    )
"#;

/// Creates every table the stores need. Safe to run on every start.
pub async fn init_schema(db_client: &DbClient) -> Result<(), DbError> {
    debug!("Initializing Beacon schema");

    for statement in [
        CREATE_USERS,
        CREATE_USER_DEVICE_TOKENS,
        CREATE_TOKEN_INDEX,
        CREATE_NOTIFICATION_REQUESTS,
    ] {
        db_client.execute(statement).await?;
    }

    info!("Beacon schema initialized successfully");
    Ok(())
}
