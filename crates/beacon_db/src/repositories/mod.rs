//! Store implementations
//!
//! SQL-backed stores for production and in-memory stores for local runs without a
//! database and for tests.

pub mod memory;
pub mod request_store_sql;
pub mod store_factory;
pub mod token_store_sql;

pub use memory::{InMemoryRequestStore, InMemoryTokenStore};
pub use request_store_sql::SqlRequestStore;
pub use store_factory::{SqlStoreFactory, SqlStores};
pub use token_store_sql::SqlTokenStore;

use crate::error::DbError;
use chrono::{DateTime, Utc};

pub(crate) fn timestamp_to_text(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

/// Maps the empty-string sentinel used for NULL text columns back to `None`.
pub(crate) fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    value
        .map(|text| {
            DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DbError::DecodeError(format!("invalid timestamp '{}': {}", text, e)))
        })
        .transpose()
}
