use crate::models::ErrorResponse;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use services::guard::{self, GuardContext, RouteDecision};
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct RedirectResponse {
    pub redirect: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStateResponse {
    pub is_authenticated: bool,
    pub is_loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GuardQuery {
    #[serde(default = "default_guard_path")]
    pub path: String,
}

fn default_guard_path() -> String {
    "/".to_string()
}

#[derive(Debug, Serialize)]
pub struct GuardResponse {
    pub decision: RouteDecision,
}

/// Start the redirect-based sign-in
pub async fn login(
    State(state): State<AppState>,
) -> Result<Json<RedirectResponse>, (StatusCode, Json<ErrorResponse>)> {
    let manager = state.sessions.manager().await;

    match manager.login() {
        Some(url) => Ok(Json(RedirectResponse {
            redirect: url.to_string(),
        })),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "Sign-in is unavailable".to_string(),
                "signin_unavailable".to_string(),
            )),
        )),
    }
}

/// Complete the code-redirect round trip from `{origin}/auth-callback`
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<SessionStateResponse>, (StatusCode, Json<ErrorResponse>)> {
    let manager = state.sessions.manager().await;

    match manager.handle_callback(&query.code).await {
        Ok(()) => Ok(Json(session_state(&manager))),
        Err(e) => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new(e.to_string(), "signin_failed".to_string())),
        )),
    }
}

/// Start the redirect-based sign-out
pub async fn logout(
    State(state): State<AppState>,
) -> Result<Json<RedirectResponse>, (StatusCode, Json<ErrorResponse>)> {
    let manager = state.sessions.manager().await;

    match manager.logout().await {
        Some(url) => Ok(Json(RedirectResponse {
            redirect: url.to_string(),
        })),
        None => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(
                "Sign-out is unavailable".to_string(),
                "signout_unavailable".to_string(),
            )),
        )),
    }
}

/// Session state read-model consumed by the dashboard shell
pub async fn session(State(state): State<AppState>) -> Json<SessionStateResponse> {
    let manager = state.sessions.manager().await;
    Json(session_state(&manager))
}

/// Route-guard decision for a protected path
pub async fn guard(
    State(state): State<AppState>,
    Query(query): Query<GuardQuery>,
) -> Json<GuardResponse> {
    let manager = state.sessions.manager().await;
    let check = state.config_store.check().await;

    let snapshot = manager.snapshot();
    let context = GuardContext::from_state(&snapshot, &check);
    let decision = guard::decide(&query.path, &context);

    debug!(path = %query.path, ?decision, "Guard decision");
    Json(GuardResponse { decision })
}

fn session_state(manager: &services::SessionManager) -> SessionStateResponse {
    let snapshot = manager.snapshot();
    SessionStateResponse {
        is_authenticated: manager.is_authenticated(),
        is_loading: snapshot.is_loading,
        error: snapshot.error,
    }
}
