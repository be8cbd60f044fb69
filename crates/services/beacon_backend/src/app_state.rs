use beacon_common::{DeliveryProvider, RequestStore, TokenStore};
use beacon_config::AppConfig;
use beacon_dispatch::{CallableHandler, DispatchEngine, TriggerHandler, UserNotificationHandler};
use std::sync::Arc;

/// The three dispatch entry points, sharing one engine.
pub struct DispatchHandlers {
    pub trigger: TriggerHandler,
    pub callable: CallableHandler,
    pub users: UserNotificationHandler,
}

impl DispatchHandlers {
    pub fn new(
        config: &AppConfig,
        provider: Arc<dyn DeliveryProvider>,
        tokens: Arc<dyn TokenStore>,
        requests: Arc<dyn RequestStore>,
    ) -> Self {
        let engine = Arc::new(DispatchEngine::from_config(
            provider,
            tokens.clone(),
            requests.clone(),
            &config.dispatch,
            &config.platform,
        ));
        let max_batch_size = config.dispatch.max_batch_size;

        Self {
            trigger: TriggerHandler::new(engine.clone(), max_batch_size),
            callable: CallableHandler::new(engine.clone(), requests.clone(), max_batch_size),
            users: UserNotificationHandler::new(engine, tokens, requests, max_batch_size),
        }
    }
}

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<dyn TokenStore>,
    pub requests: Arc<dyn RequestStore>,
    /// `None` when no delivery provider is configured; the dispatch routes are
    /// not mounted then.
    pub dispatch: Option<Arc<DispatchHandlers>>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        tokens: Arc<dyn TokenStore>,
        requests: Arc<dyn RequestStore>,
        provider: Option<Arc<dyn DeliveryProvider>>,
    ) -> Self {
        let dispatch = provider.map(|provider| {
            Arc::new(DispatchHandlers::new(
                &config,
                provider,
                tokens.clone(),
                requests.clone(),
            ))
        });

        Self {
            config,
            tokens,
            requests,
            dispatch,
        }
    }

    /// The configured callable api key, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.config
            .callable
            .as_ref()
            .and_then(|callable| callable.api_key.as_deref())
            .filter(|key| !key.is_empty())
    }
}
