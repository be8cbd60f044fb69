//! Factory for the SQL-backed stores

use crate::repositories::{SqlRequestStore, SqlTokenStore};
use crate::{DbClient, RepositoryFactory};

/// Both SQL stores, sharing one pool.
#[derive(Debug, Clone)]
pub struct SqlStores {
    pub tokens: SqlTokenStore,
    pub requests: SqlRequestStore,
}

#[derive(Debug, Clone)]
pub struct SqlStoreFactory;

impl SqlStoreFactory {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqlStoreFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryFactory<SqlStores, DbClient> for SqlStoreFactory {
    fn create_repository(&self, db_client: DbClient) -> SqlStores {
        SqlStores {
            tokens: SqlTokenStore::new(db_client.clone()),
            requests: SqlRequestStore::new(db_client),
        }
    }
}
