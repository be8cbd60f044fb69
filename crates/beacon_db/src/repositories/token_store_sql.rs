//! SQL implementation of the token store
//!
//! Token sets live in `user_device_tokens`, one row per (user, token) pair, with
//! the per-user `last_token_update` stamp on `users`.

use crate::error::DbError;
use crate::repositories::{non_empty, parse_timestamp, timestamp_to_text};
use crate::DbClient;
use beacon_common::models::{DeviceToken, UserTokenSet};
use beacon_common::{BoxFuture, StoreError, TokenStore};
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, error, info};

/// SQL implementation of the token store
#[derive(Debug, Clone)]
pub struct SqlTokenStore {
    db_client: DbClient,
}

impl SqlTokenStore {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn find_users(&self, token: &DeviceToken) -> Result<Vec<String>, DbError> {
        debug!("Finding users holding token {}", token);

        let rows = sqlx::query(
            r#"
            SELECT DISTINCT user_id
            FROM user_device_tokens
            WHERE token = $1
            ORDER BY user_id
            "#,
        )
        .bind(token.as_str())
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to query users for token: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("user_id").map_err(DbError::from))
            .collect()
    }

    async fn remove_token(
        &self,
        token: &DeviceToken,
        user_ids: &[String],
        stamped_at: DateTime<Utc>,
    ) -> Result<usize, DbError> {
        let stamp = timestamp_to_text(&stamped_at);
        let mut tx = self.db_client.begin().await?;
        let mut changed = 0usize;

        for user_id in user_ids {
            let deleted = sqlx::query(
                r#"
                DELETE FROM user_device_tokens
                WHERE user_id = $1 AND token = $2
                "#,
            )
            .bind(user_id.as_str())
            .bind(token.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to remove token from user {}: {}", user_id, e);
                DbError::QueryError(e.to_string())
            })?;

            if deleted.rows_affected() == 0 {
                continue;
            }

            sqlx::query(
                r#"
                UPDATE users
                SET last_token_update = $1
                WHERE user_id = $2
                "#,
            )
            .bind(stamp.as_str())
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Failed to stamp user {}: {}", user_id, e);
                DbError::QueryError(e.to_string())
            })?;
            changed += 1;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        info!("Removed token {} from {} users", token, changed);
        Ok(changed)
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<UserTokenSet>, DbError> {
        let user_row = sqlx::query(
            r#"
            SELECT user_id, COALESCE(last_token_update, '') AS last_token_update
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        let Some(user_row) = user_row else {
            return Ok(None);
        };

        let token_rows = sqlx::query(
            r#"
            SELECT token
            FROM user_device_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(self.db_client.pool())
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        let mut set = UserTokenSet::new(user_row.try_get::<String, _>("user_id")?);
        set.last_token_update =
            parse_timestamp(non_empty(user_row.try_get("last_token_update")?))?;
        for row in &token_rows {
            set.tokens
                .insert(DeviceToken::new(row.try_get::<String, _>("token")?));
        }
        Ok(Some(set))
    }

    async fn insert_token(&self, user_id: &str, token: &DeviceToken) -> Result<UserTokenSet, DbError> {
        debug!("Registering token {} for user {}", token, user_id);
        let now = timestamp_to_text(&Utc::now());
        let mut tx = self.db_client.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (user_id, created_at)
            VALUES ($1, $2)
            ON CONFLICT(user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_device_tokens (user_id, token, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT(user_id, token) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(token.as_str())
        .bind(now.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::QueryError(e.to_string()))?;

        if inserted.rows_affected() > 0 {
            sqlx::query("UPDATE users SET last_token_update = $1 WHERE user_id = $2")
                .bind(now.as_str())
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| DbError::QueryError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        self.load_user(user_id)
            .await?
            .ok_or_else(|| DbError::QueryError(format!("user {} vanished after insert", user_id)))
    }
}

impl TokenStore for SqlTokenStore {
    fn find_users_with_token<'a>(
        &'a self,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, Vec<String>, StoreError> {
        Box::pin(async move { self.find_users(token).await.map_err(StoreError::from) })
    }

    fn remove_token_from_users<'a>(
        &'a self,
        token: &'a DeviceToken,
        user_ids: &'a [String],
        stamped_at: DateTime<Utc>,
    ) -> BoxFuture<'a, usize, StoreError> {
        Box::pin(async move {
            self.remove_token(token, user_ids, stamped_at)
                .await
                .map_err(StoreError::from)
        })
    }

    fn tokens_for_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Option<UserTokenSet>, StoreError> {
        Box::pin(async move { self.load_user(user_id).await.map_err(StoreError::from) })
    }

    fn add_token<'a>(
        &'a self,
        user_id: &'a str,
        token: &'a DeviceToken,
    ) -> BoxFuture<'a, UserTokenSet, StoreError> {
        Box::pin(async move {
            self.insert_token(user_id, token)
                .await
                .map_err(StoreError::from)
        })
    }
}
