// Server entry: mounts the API routes, the static web client and the
// uploads directory, then serves until a shutdown signal arrives.
use anyhow::Result;
use asistente_server::config::{bind_address, load_config, Config};
use asistente_server::shutdown::shutdown_signal;
use asistente_server::state::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum::Router;
use futures::FutureExt;
use std::any::Any as StdAny;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config();
    init_tracing(&config);
    let state = Arc::new(AppState::new(config.clone())?);

    let app = asistente_server::api::build_router(state.clone());
    let app = mount_static_file(app, "web/index.html", "/");
    let app = mount_static(app, "web", "/web");
    // Uploaded bytes are served back verbatim; CORS stays open via the
    // global layer, matching the upload contract.
    let app = app.nest_service(
        "/uploads",
        ServeDir::new(state.uploads_dir.clone()),
    );

    let app = app
        .layer(build_cors(&config))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(panic_guard))
        .with_state(state.clone());

    let addr = bind_address(&config);
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    info!("asistente-server listening on http://{addr}");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(err) = server.await {
        warn!("server exited with error: {err}");
    }

    Ok(())
}

async fn panic_guard(request: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let result = AssertUnwindSafe(next.run(request)).catch_unwind().await;
    match result {
        Ok(response) => Ok(response),
        Err(panic) => {
            let detail = panic_message(panic.as_ref());
            tracing::error!("panic while handling {method} {path}: {detail}");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "Internal server error" })),
            )
                .into_response())
        }
    }
}

fn panic_message(panic: &(dyn StdAny + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        return message.to_string();
    }
    if let Some(message) = panic.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

fn init_tracing(config: &Config) {
    let default_level = config.observability.log_level.trim();
    let default_level = if default_level.is_empty() {
        "info".to_string()
    } else {
        default_level.to_lowercase()
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn mount_static<S>(app: Router<S>, dir: &str, route: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let path = PathBuf::from(dir);
    if path.exists() {
        // Only mount existing directories so trimmed deployments still boot.
        let service = ServeDir::new(path).append_index_html_on_directories(true);
        let nested = Router::new().fallback_service(service);
        app.nest(&format!("{}/", route.trim_end_matches('/')), nested)
    } else {
        app
    }
}

fn mount_static_file<S>(app: Router<S>, file: &str, route: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let path = PathBuf::from(file);
    if path.exists() {
        app.route_service(route, ServeFile::new(path))
    } else {
        app
    }
}

fn build_cors(config: &Config) -> CorsLayer {
    let mut cors = CorsLayer::new();

    match config
        .cors
        .allow_origins
        .as_ref()
        .map(|value| value.iter().map(|item| item.as_str()).collect::<Vec<_>>())
    {
        Some(origins) if origins.iter().any(|value| *value == "*") => {
            cors = cors.allow_origin(Any);
        }
        Some(origins) => {
            let values = origins
                .iter()
                .filter_map(|value| value.parse().ok())
                .collect::<Vec<_>>();
            if !values.is_empty() {
                cors = cors.allow_origin(AllowOrigin::list(values));
            }
        }
        None => {
            cors = cors.allow_origin(Any);
        }
    }

    match config
        .cors
        .allow_methods
        .as_ref()
        .map(|value| value.iter().map(|item| item.as_str()).collect::<Vec<_>>())
    {
        Some(methods) if methods.iter().any(|value| *value == "*") => {
            cors = cors.allow_methods(Any);
        }
        Some(methods) => {
            let values = methods
                .iter()
                .filter_map(|value| value.parse().ok())
                .collect::<Vec<_>>();
            if !values.is_empty() {
                cors = cors.allow_methods(AllowMethods::list(values));
            }
        }
        None => {
            cors = cors.allow_methods(Any);
        }
    }

    match config
        .cors
        .allow_headers
        .as_ref()
        .map(|value| value.iter().map(|item| item.as_str()).collect::<Vec<_>>())
    {
        Some(headers) if headers.iter().any(|value| *value == "*") => {
            cors = cors.allow_headers(Any);
        }
        Some(headers) => {
            let values = headers
                .iter()
                .filter_map(|value| value.parse().ok())
                .collect::<Vec<_>>();
            if !values.is_empty() {
                cors = cors.allow_headers(AllowHeaders::list(values));
            }
        }
        None => {
            cors = cors.allow_headers(Any);
        }
    }

    if config.cors.allow_credentials.unwrap_or(false) {
        cors = cors.allow_credentials(true);
    }

    cors
}
