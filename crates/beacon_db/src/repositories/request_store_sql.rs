//! SQL implementation of the notification request store

use crate::error::DbError;
use crate::repositories::{non_empty, parse_timestamp, timestamp_to_text};
use crate::DbClient;
use beacon_common::models::{NotificationRequest, NotificationStatus, StatusUpdate};
use beacon_common::{BoxFuture, RequestStore, StoreError};
use sqlx::any::AnyRow;
use sqlx::Row;
use tracing::{debug, error, info};

// Nullable columns are coalesced to sentinels: a negative count or an empty
// string reads back as `None`. The `Any` driver rejects NULL values on decode.
const SELECT_REQUEST: &str = r#"
    SELECT id, tokens, payload, status,
           COALESCE(success_count, -1) AS success_count,
           COALESCE(failure_count, -1) AS failure_count,
           COALESCE(error, '') AS error,
           error_details, created_at,
           COALESCE(updated_at, '') AS updated_at,
           COALESCE(sent_at, '') AS sent_at
    FROM notification_requests
    WHERE id = $1
"#;

/// SQL implementation of the notification request store
#[derive(Debug, Clone)]
pub struct SqlRequestStore {
    db_client: DbClient,
}

impl SqlRequestStore {
    pub fn new(db_client: DbClient) -> Self {
        Self { db_client }
    }

    async fn insert(&self, request: NotificationRequest) -> Result<NotificationRequest, DbError> {
        debug!("Storing notification request {}", request.id);

        sqlx::query(
            r#"
            INSERT INTO notification_requests (
                id, tokens, payload, status, success_count, failure_count, error,
                error_details, created_at, updated_at, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(request.id.as_str())
        .bind(to_json(&request.tokens)?)
        .bind(to_json(&request.payload)?)
        .bind(request.status.as_str())
        .bind(request.success_count.map(count_to_i64))
        .bind(request.failure_count.map(count_to_i64))
        .bind(request.error.clone())
        .bind(to_json(&request.error_details)?)
        .bind(timestamp_to_text(&request.created_at))
        .bind(request.updated_at.as_ref().map(timestamp_to_text))
        .bind(request.sent_at.as_ref().map(timestamp_to_text))
        .execute(self.db_client.pool())
        .await
        .map_err(|e| {
            error!("Failed to insert notification request: {}", e);
            DbError::QueryError(e.to_string())
        })?;

        info!("Notification request {} stored", request.id);
        Ok(request)
    }

    async fn find(&self, request_id: &str) -> Result<Option<NotificationRequest>, DbError> {
        let row = sqlx::query(SELECT_REQUEST)
            .bind(request_id)
            .fetch_optional(self.db_client.pool())
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        row.as_ref().map(row_to_request).transpose()
    }

    /// Returns `Ok(false)` when no request with this id exists.
    async fn update(&self, request_id: &str, update: &StatusUpdate) -> Result<bool, DbError> {
        let mut tx = self.db_client.begin().await?;

        let row = sqlx::query(SELECT_REQUEST)
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DbError::QueryError(e.to_string()))?;

        let Some(row) = row else {
            return Ok(false);
        };

        let mut request = row_to_request(&row)?;
        update.apply_to(&mut request);

        sqlx::query(
            r#"
            UPDATE notification_requests
            SET status = $1, success_count = $2, failure_count = $3, error = $4,
                error_details = $5, updated_at = $6, sent_at = $7
            WHERE id = $8
            "#,
        )
        .bind(request.status.as_str())
        .bind(request.success_count.map(count_to_i64))
        .bind(request.failure_count.map(count_to_i64))
        .bind(request.error.clone())
        .bind(to_json(&request.error_details)?)
        .bind(request.updated_at.as_ref().map(timestamp_to_text))
        .bind(request.sent_at.as_ref().map(timestamp_to_text))
        .bind(request_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Failed to update notification request {}: {}", request_id, e);
            DbError::QueryError(e.to_string())
        })?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionError(e.to_string()))?;

        debug!("Notification request {} is now {}", request_id, request.status);
        Ok(true)
    }
}

impl RequestStore for SqlRequestStore {
    fn insert_request(
        &self,
        request: NotificationRequest,
    ) -> BoxFuture<'_, NotificationRequest, StoreError> {
        Box::pin(async move { self.insert(request).await.map_err(StoreError::from) })
    }

    fn get_request<'a>(
        &'a self,
        request_id: &'a str,
    ) -> BoxFuture<'a, Option<NotificationRequest>, StoreError> {
        Box::pin(async move { self.find(request_id).await.map_err(StoreError::from) })
    }

    fn apply_status_update<'a>(
        &'a self,
        request_id: &'a str,
        update: StatusUpdate,
    ) -> BoxFuture<'a, (), StoreError> {
        Box::pin(async move {
            match self.update(request_id, &update).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(StoreError::NotFound(format!(
                    "notification request {}",
                    request_id
                ))),
                Err(e) => Err(StoreError::from(e)),
            }
        })
    }
}

fn row_to_request(row: &AnyRow) -> Result<NotificationRequest, DbError> {
    let status: String = row.try_get("status")?;
    Ok(NotificationRequest {
        id: row.try_get("id")?,
        tokens: from_json(&row.try_get::<String, _>("tokens")?)?,
        payload: from_json(&row.try_get::<String, _>("payload")?)?,
        status: status
            .parse::<NotificationStatus>()
            .map_err(|e| DbError::DecodeError(e.to_string()))?,
        success_count: count_from_i64(row.try_get("success_count")?),
        failure_count: count_from_i64(row.try_get("failure_count")?),
        error: non_empty(row.try_get("error")?),
        error_details: from_json(&row.try_get::<String, _>("error_details")?)?,
        created_at: parse_timestamp(Some(row.try_get("created_at")?))?
            .ok_or_else(|| DbError::DecodeError("missing created_at".to_string()))?,
        updated_at: parse_timestamp(non_empty(row.try_get("updated_at")?))?,
        sent_at: parse_timestamp(non_empty(row.try_get("sent_at")?))?,
    })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, DbError> {
    serde_json::to_string(value).map_err(|e| DbError::DecodeError(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, DbError> {
    serde_json::from_str(text).map_err(|e| DbError::DecodeError(e.to_string()))
}

fn count_to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

fn count_from_i64(count: i64) -> Option<usize> {
    usize::try_from(count).ok()
}
