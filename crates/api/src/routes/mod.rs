pub mod auth;
pub mod auth_config;
pub mod functions;
pub mod health;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health::health_check))
        .route("/v1/auth/login", get(auth::login))
        .route("/v1/auth/callback", get(auth::callback))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/session", get(auth::session))
        .route("/v1/auth/guard", get(auth::guard))
        .route(
            "/v1/auth-config",
            get(auth_config::get_auth_config).post(auth_config::save_auth_config),
        )
        .route("/v1/auth-config/check", get(auth_config::check_auth_config))
        .route(
            "/v1/functions/fetch-internal-user",
            post(functions::fetch_internal_user),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
