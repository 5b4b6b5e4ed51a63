use crate::models::ErrorResponse;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use services::config_store::{
    ConfigCheckResult, ConfigSource, IdentityProviderConfig, LoadedConfig,
};
use tracing::info;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfigResponse {
    pub client_id: String,
    pub tenant: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub source: ConfigSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAuthConfigRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAuthConfigResponse {
    pub saved: bool,
    pub persisted_remotely: bool,
}

/// Current identity-provider configuration for the administrative form
pub async fn get_auth_config(
    State(state): State<AppState>,
) -> Result<Json<AuthConfigResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.config_store.load().await {
        LoadedConfig::Resolved { config, source } => Ok(Json(AuthConfigResponse {
            client_id: config.client_id,
            tenant: config.tenant,
            client_secret: config.client_secret,
            source,
        })),
        LoadedConfig::NotFound => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new(
                "No identity configuration found".to_string(),
                "config_not_found".to_string(),
            )),
        )),
    }
}

/// Save a configuration from the administrative form and rebuild the
/// session manager around it
pub async fn save_auth_config(
    State(state): State<AppState>,
    Json(request): Json<SaveAuthConfigRequest>,
) -> Result<Json<SaveAuthConfigResponse>, (StatusCode, Json<ErrorResponse>)> {
    let config = IdentityProviderConfig {
        client_id: request.client_id,
        tenant: request.tenant,
        client_secret: request.client_secret,
    };

    if !config.is_complete() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Client id and tenant are required".to_string(),
                "incomplete_config".to_string(),
            )),
        ));
    }

    let outcome = state.config_store.save(&config).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(
                format!("Failed to save configuration: {e}"),
                "save_failed".to_string(),
            )),
        )
    })?;

    // Client id / tenant changed: tear the old session manager down and
    // construct a fresh one from the stored values.
    let loaded = state.config_store.load().await;
    state.sessions.reconfigure(&loaded).await;
    info!("Identity configuration updated");

    Ok(Json(SaveAuthConfigResponse {
        saved: true,
        persisted_remotely: outcome.persisted_remotely,
    }))
}

/// Per-field presence check consumed by the login screen and the guard
pub async fn check_auth_config(State(state): State<AppState>) -> Json<ConfigCheckResult> {
    Json(state.config_store.check().await)
}
