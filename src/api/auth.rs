// Password-equality authentication. By design there are no tokens or
// sessions: a successful check only informs the client UI, later requests
// are not gated server-side.
use crate::api::errors::ApiError;
use crate::state::AppState;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth/admin", post(auth_admin))
        .route("/api/auth/user", post(auth_user))
}

#[derive(Debug, Deserialize)]
struct AuthRequest {
    #[serde(default)]
    password: String,
}

async fn auth_admin(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AuthRequest>,
) -> Result<Json<Value>, ApiError> {
    let config = state.storage.get_config().map_err(|err| {
        error!("failed to load configuration for admin auth: {err}");
        ApiError::internal("Authentication failed")
    })?;
    if config.admin_password != payload.password {
        return Err(ApiError::auth("Invalid admin password"));
    }
    // The only place the stored api key is revealed.
    Ok(Json(json!({ "success": true, "apiKey": config.api_key })))
}

async fn auth_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AuthRequest>,
) -> Result<Json<Value>, ApiError> {
    let config = state.storage.get_config().map_err(|err| {
        error!("failed to load configuration for user auth: {err}");
        ApiError::internal("Authentication failed")
    })?;
    if !config.require_user_password {
        return Ok(Json(json!({ "success": true })));
    }
    if config.user_password.as_deref() != Some(payload.password.as_str()) {
        return Err(ApiError::auth("Invalid user password"));
    }
    Ok(Json(json!({ "success": true })))
}
