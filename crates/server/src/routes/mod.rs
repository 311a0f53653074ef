use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{IntoMakeService, get},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{DeploymentImpl, middleware::require_auth};

pub mod auth;
pub mod health;
pub mod projects;
pub mod socket;
pub mod tasks;
pub mod ws_helpers;

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    app(deployment).into_make_service()
}

/// The `/api` application without the make-service wrapper.
pub fn app(deployment: DeploymentImpl) -> Router {
    let protected = Router::new()
        .merge(auth::protected_router())
        .merge(projects::router(&deployment))
        .merge(tasks::router(&deployment))
        .layer(from_fn_with_state(deployment.clone(), require_auth));

    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::router())
        .merge(socket::router())
        .merge(protected);

    Router::new()
        .nest("/api", base_routes)
        .layer(cors_layer(&deployment.config().cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(deployment)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origin.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS_ORIGIN '{}': {}", origin, e);
            layer
        }
    }
}
