use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app_state::AppState;
use crate::auth::require_api_key;
use crate::handlers::{
    create_notification_handler, get_notification_handler, register_device_token_handler,
    send_handler, user_notification_handler,
};

/// Routes relative to `/api`.
///
/// Dispatch routes are only mounted when a delivery provider is configured.
pub fn routes(state: AppState) -> Router {
    let mut public = Router::new().route("/", get(|| async { "Welcome to the Beacon push API!" }));
    let mut protected = Router::new()
        .route("/push/notifications/{id}", get(get_notification_handler))
        .route(
            "/users/{user_id}/device-tokens",
            post(register_device_token_handler),
        );

    if state.dispatch.is_some() {
        public = public.route("/push/send", post(send_handler));
        protected = protected
            .route("/push/notifications", post(create_notification_handler))
            .route(
                "/users/{user_id}/notifications",
                post(user_notification_handler),
            );
        info!("Push dispatch routes initialized");
    }

    let protected =
        protected.route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    public.merge(protected).with_state(state)
}

/// The full application: API routes under `/api`, plus Swagger UI at `/api/docs`
/// when the `openapi` feature is enabled.
pub fn app(state: AppState) -> Router {
    #[allow(unused_mut)]
    let mut app = Router::new()
        .nest("/api", routes(state))
        .layer(TraceLayer::new_for_http());

    #[cfg(feature = "openapi")]
    {
        use crate::doc::BeaconApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        info!("📖 Adding Swagger UI at /api/docs");
        let swagger_ui = SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", BeaconApiDoc::openapi());
        app = app.merge(swagger_ui);
    }

    app
}
