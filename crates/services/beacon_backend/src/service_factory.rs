//! Builds the stores and the delivery provider from configuration.
use beacon_common::{BeaconError, DeliveryProvider, RequestStore, TokenStore};
use beacon_config::AppConfig;
use beacon_db::{
    init_schema, DbClient, InMemoryRequestStore, InMemoryTokenStore, RepositoryFactory,
    SqlStoreFactory,
};
use beacon_firebase::FirebaseClient;
use std::sync::Arc;
use tracing::{info, warn};

use crate::app_state::AppState;

pub struct BeaconServiceFactory {
    config: Arc<AppConfig>,
}

impl BeaconServiceFactory {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config }
    }

    /// SQL stores when a database is configured, in-memory stores otherwise.
    pub async fn stores(&self) -> Result<(Arc<dyn TokenStore>, Arc<dyn RequestStore>), BeaconError> {
        match self.config.database.as_ref() {
            Some(db_config) => {
                info!("ℹ️ Initializing database stores...");
                let db_client = DbClient::from_config(db_config).await?;
                init_schema(&db_client).await?;
                let stores = SqlStoreFactory::new().create_repository(db_client);
                Ok((Arc::new(stores.tokens), Arc::new(stores.requests)))
            }
            None => {
                warn!("No database configured, using in-memory stores");
                Ok((
                    Arc::new(InMemoryTokenStore::new()),
                    Arc::new(InMemoryRequestStore::new()),
                ))
            }
        }
    }

    /// The FCM client, when a Firebase project is configured.
    pub fn provider(&self) -> Option<Arc<dyn DeliveryProvider>> {
        let firebase = self
            .config
            .firebase
            .as_ref()
            .filter(|firebase| firebase.project_id.is_some());

        match firebase {
            Some(firebase) => {
                info!("ℹ️ Initializing Firebase Cloud Messaging provider...");
                Some(Arc::new(FirebaseClient::new(firebase.clone())))
            }
            None => {
                warn!("Firebase is not configured, push dispatch is disabled");
                None
            }
        }
    }

    pub async fn app_state(&self) -> Result<AppState, BeaconError> {
        let (tokens, requests) = self.stores().await?;
        Ok(AppState::new(
            self.config.clone(),
            tokens,
            requests,
            self.provider(),
        ))
    }
}
