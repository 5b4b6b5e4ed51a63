use crate::models::ErrorResponse;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use services::enrichment::InternalProfile;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct FetchInternalUserRequest {
    #[serde(rename = "accessToken", default)]
    pub access_token: String,
}

/// Tier-B server-side function: repeat the internal-directory call with the
/// elevated credential, outside the browser's proxy constraints, and hand
/// back normalized JSON.
///
/// A malformed body is rejected by the JSON extractor; a missing or empty
/// token is rejected here.
pub async fn fetch_internal_user(
    State(state): State<AppState>,
    Json(request): Json<FetchInternalUserRequest>,
) -> Result<Json<InternalProfile>, (StatusCode, Json<ErrorResponse>)> {
    if request.access_token.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new(
                "Missing access token".to_string(),
                "missing_access_token".to_string(),
            )),
        ));
    }

    debug!("Fetching internal profile on behalf of the client");

    match state.upstream.fetch_profile(&request.access_token).await {
        Ok(profile) => Ok(Json(profile)),
        Err(e) => {
            warn!(error = %e, "Upstream internal-directory call failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::new(
                    format!("Internal directory call failed: {e}"),
                    "upstream_error".to_string(),
                )),
            ))
        }
    }
}
