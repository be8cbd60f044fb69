//! Status recording onto the originating request record.

use beacon_common::models::{ErrorDetail, NotificationStatus, StatusUpdate};
use beacon_common::RequestStore;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

/// What to write for one dispatch.
///
/// Counts are only persisted for `delivered` and `failed`. `error` and
/// `error_details` are only written when present, so stored values survive.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub status: NotificationStatus,
    pub error: Option<String>,
    pub success_count: Option<usize>,
    pub failure_count: Option<usize>,
    pub error_details: Option<Vec<ErrorDetail>>,
}

impl StatusReport {
    /// A dispatch that reached the provider and got per-token answers.
    pub fn delivery(success_count: usize, failure_count: usize, error_details: Vec<ErrorDetail>) -> Self {
        let status = if success_count > 0 {
            NotificationStatus::Delivered
        } else {
            NotificationStatus::Failed
        };
        Self {
            status,
            error: None,
            success_count: Some(success_count),
            failure_count: Some(failure_count),
            error_details: non_empty(error_details),
        }
    }

    /// A dispatch that ended in `error`.
    pub fn error(message: impl Into<String>, error_details: Vec<ErrorDetail>) -> Self {
        Self {
            status: NotificationStatus::Error,
            error: Some(message.into()),
            success_count: None,
            failure_count: None,
            error_details: non_empty(error_details),
        }
    }

    fn into_update(self) -> StatusUpdate {
        let now = Utc::now();
        let settled = self.status.is_settled_delivery();
        StatusUpdate {
            status: self.status,
            updated_at: now,
            success_count: if settled { self.success_count } else { None },
            failure_count: if settled { self.failure_count } else { None },
            sent_at: if settled { Some(now) } else { None },
            error: self.error,
            error_details: self.error_details,
        }
    }
}

fn non_empty(details: Vec<ErrorDetail>) -> Option<Vec<ErrorDetail>> {
    if details.is_empty() {
        None
    } else {
        Some(details)
    }
}

/// Whether the status write landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RecordOutcome {
    Recorded,
    Failed { reason: String },
}

impl RecordOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, RecordOutcome::Recorded)
    }
}

pub struct StatusRecorder {
    store: Arc<dyn RequestStore>,
}

impl StatusRecorder {
    pub fn new(store: Arc<dyn RequestStore>) -> Self {
        Self { store }
    }

    /// Merges `report` into the stored request.
    ///
    /// Write failures are logged and returned as [`RecordOutcome::Failed`], never
    /// propagated.
    pub async fn record_status(&self, request_id: &str, report: StatusReport) -> RecordOutcome {
        let status = report.status;
        match self
            .store
            .apply_status_update(request_id, report.into_update())
            .await
        {
            Ok(()) => {
                debug!("Recorded status {} for request {}", status, request_id);
                RecordOutcome::Recorded
            }
            Err(e) => {
                error!(
                    "Failed to record status {} for request {}: {}",
                    status, request_id, e
                );
                RecordOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_common::models::{DeviceToken, NotificationPayload, NotificationRequest};
    use beacon_db::InMemoryRequestStore;

    async fn seeded_store() -> Arc<InMemoryRequestStore> {
        let store = Arc::new(InMemoryRequestStore::new());
        let mut request = NotificationRequest::new(
            "req-1",
            vec![DeviceToken::new("token-one-123")],
            NotificationPayload::new("t", "b"),
        );
        request.error = Some("previous error".to_string());
        store.insert_request(request).await.unwrap();
        store
    }

    #[test]
    fn test_delivery_report_status() {
        assert_eq!(StatusReport::delivery(1, 4, vec![]).status, NotificationStatus::Delivered);
        assert_eq!(StatusReport::delivery(0, 4, vec![]).status, NotificationStatus::Failed);
        assert_eq!(StatusReport::delivery(0, 4, vec![]).error_details, None);
    }

    #[test]
    fn test_error_report_drops_counts() {
        let mut report = StatusReport::error("boom", vec![]);
        report.failure_count = Some(3);
        let update = report.into_update();
        assert_eq!(update.failure_count, None);
        assert_eq!(update.sent_at, None);
        assert_eq!(update.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_record_delivery_keeps_unsupplied_error() {
        let store = seeded_store().await;
        let recorder = StatusRecorder::new(store.clone());

        let outcome = recorder
            .record_status("req-1", StatusReport::delivery(1, 0, vec![]))
            .await;
        assert_eq!(outcome, RecordOutcome::Recorded);

        let stored = store.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(stored.status, NotificationStatus::Delivered);
        assert_eq!(stored.success_count, Some(1));
        assert_eq!(stored.failure_count, Some(0));
        assert!(stored.sent_at.is_some());
        assert_eq!(stored.error.as_deref(), Some("previous error"));
    }

    #[tokio::test]
    async fn test_write_failure_is_returned_not_raised() {
        let store = Arc::new(InMemoryRequestStore::new());
        let recorder = StatusRecorder::new(store);

        let outcome = recorder
            .record_status("missing", StatusReport::error("no device tokens provided", vec![]))
            .await;
        assert!(matches!(outcome, RecordOutcome::Failed { .. }));
        assert!(!outcome.is_recorded());
    }
}
