// API routes, split by domain like the rest of the tree.
pub mod auth;
pub mod config;
pub mod errors;
pub mod files;
pub mod messages;

use crate::state::AppState;
use axum::Router;
use std::sync::Arc;

pub fn build_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(config::router())
        .merge(auth::router())
        .merge(messages::router())
        .merge(files::router())
        .with_state(state)
}
