// Configuration endpoints. Secrets are stripped from every response here;
// the admin credential reveal lives in the auth module.
use crate::api::errors::ApiError;
use crate::schemas::{ConfigUpdate, PublicConfig};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::error;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/config", get(get_config).put(update_config))
}

async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PublicConfig>, ApiError> {
    let config = state.storage.get_config().map_err(|err| {
        error!("failed to load configuration: {err}");
        ApiError::internal("Failed to get configuration")
    })?;
    Ok(Json(PublicConfig::from(config)))
}

async fn update_config(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConfigUpdate>, JsonRejection>,
) -> Result<Json<PublicConfig>, ApiError> {
    let Json(update) =
        payload.map_err(|_| ApiError::validation("Invalid configuration data"))?;
    let updated = state.storage.update_config(&update).map_err(|err| {
        error!("failed to update configuration: {err}");
        ApiError::internal("Failed to update configuration")
    })?;
    Ok(Json(PublicConfig::from(updated)))
}
