use beacon_backend::{app, BeaconServiceFactory};
use beacon_common::logging;
use beacon_config::load_config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(load_config()?);
    // Flushes the log file on drop.
    let _log_guard = logging::init_from_config(&config.logging);

    let state = BeaconServiceFactory::new(config.clone()).app_state().await?;
    let app = app(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Starting server at http://{}", addr);
    info!("API endpoints available at http://{}/api", addr);

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
