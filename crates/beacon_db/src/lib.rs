//! Database integration for Beacon
//!
//! Provides the SQL-backed [`beacon_common::TokenStore`] and
//! [`beacon_common::RequestStore`] implementations on top of an `sqlx::Any` pool,
//! plus in-memory stores for running without a database.
//!
//! # Example
//!
//! ```rust,no_run
//! use beacon_db::{init_schema, DbClient, RepositoryFactory, SqlStoreFactory};
//!
//! async fn setup_stores() -> Result<(), Box<dyn std::error::Error>> {
//!     let db_client = DbClient::from_url("sqlite:data/beacon.db").await?;
//!     init_schema(&db_client).await?;
//!     let stores = SqlStoreFactory::new().create_repository(db_client);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod repositories;
pub mod repository;
pub mod schema;

pub use client::DbClient;
pub use error::DbError;
pub use repository::RepositoryFactory;
pub use schema::init_schema;

pub use repositories::{
    InMemoryRequestStore, InMemoryTokenStore, SqlRequestStore, SqlStoreFactory, SqlStores,
    SqlTokenStore,
};
