// End-to-end contract tests over the HTTP router with the in-memory backend.
use asistente_server::config::Config;
use asistente_server::state::AppState;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MULTIPART_BOUNDARY: &str = "asistente-test-boundary";

struct TestApp {
    router: Router,
    uploads_dir: TempDir,
}

fn test_app(api_url: &str) -> TestApp {
    let uploads_dir = TempDir::new().expect("tempdir");
    let mut config = Config::default();
    config.storage.backend = "memory".to_string();
    config.uploads.dir = uploads_dir.path().to_string_lossy().into_owned();
    config.assistant.default_api_url = api_url.to_string();
    config.assistant.default_api_key = "clave-servicio".to_string();
    config.assistant.timeout_s = 5;

    let state = Arc::new(AppState::new(config).expect("state"));
    let router = asistente_server::build_router(state.clone()).with_state(state);
    TestApp {
        router,
        uploads_dir,
    }
}

async fn send_json(
    app: &TestApp,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("send request");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let payload = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, payload)
}

fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (filename, content_type, data) in parts {
        body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}

async fn upload(app: &TestApp, parts: &[(&str, &str, &[u8])]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/files")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .expect("build upload");
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("send upload");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let payload = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, payload)
}

#[tokio::test]
async fn config_round_trip_strips_secrets() {
    let app = test_app("http://127.0.0.1:9/unused");

    let (status, config) = send_json(&app, Method::GET, "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["appTitle"], json!("Asistente IA - Compras Públicas"));
    assert!(config.get("adminPassword").is_none());
    assert!(config.get("apiKey").is_none());

    let (status, updated) = send_json(
        &app,
        Method::PUT,
        "/api/config",
        Some(json!({ "appTitle": "Mesa de Ayuda", "fontSize": "large" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["appTitle"], json!("Mesa de Ayuda"));
    assert_eq!(updated["fontSize"], json!("large"));
    assert!(updated.get("adminPassword").is_none());
    assert!(updated.get("apiKey").is_none());

    let (_, reloaded) = send_json(&app, Method::GET, "/api/config", None).await;
    assert_eq!(reloaded["appTitle"], json!("Mesa de Ayuda"));
    assert_eq!(reloaded["subtitle"], json!("Armada de Chile"));
}

#[tokio::test]
async fn config_put_rejects_invalid_payloads() {
    let app = test_app("http://127.0.0.1:9/unused");

    let (status, body) = send_json(
        &app,
        Method::PUT,
        "/api/config",
        Some(json!({ "fontSize": "giant" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid configuration data"));

    let (status, _) = send_json(&app, Method::PUT, "/api/config", Some(json!(["nope"]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // The rejected update left no partial effect behind.
    let (_, config) = send_json(&app, Method::GET, "/api/config", None).await;
    assert_eq!(config["fontSize"], json!("medium"));
}

#[tokio::test]
async fn admin_auth_reveals_api_key_only_on_success() {
    let app = test_app("http://127.0.0.1:9/unused");

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/auth/admin",
        Some(json!({ "password": "incorrecta" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Invalid admin password"));

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/auth/admin",
        Some(json!({ "password": "admin123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["apiKey"], json!("clave-servicio"));
}

#[tokio::test]
async fn user_auth_is_unconditional_until_a_password_is_required() {
    let app = test_app("http://127.0.0.1:9/unused");

    // requireUserPassword defaults to false: any password succeeds.
    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/auth/user",
        Some(json!({ "password": "cualquier cosa" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let (status, _) = send_json(
        &app,
        Method::PUT,
        "/api/config",
        Some(json!({ "requireUserPassword": true, "userPassword": "s3creto" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/api/auth/user",
        Some(json!({ "password": "equivocada" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/auth/user",
        Some(json!({ "password": "s3creto" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn chat_send_stores_both_turns_and_keeps_content_intact() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prediction/demo"))
        .and(body_partial_json(json!({ "question": "línea uno\nlínea dos — ¿señal? 你好" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "¡Hola!" })))
        .expect(1)
        .mount(&upstream)
        .await;

    let app = test_app(&format!("{}/prediction/demo", upstream.uri()));
    let content = "línea uno\nlínea dos — ¿señal? 你好";

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "content": content, "sender": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["userMessage"]["content"], json!(content));
    assert_eq!(body["userMessage"]["sender"], json!("user"));
    assert_eq!(body["aiMessage"]["content"], json!("¡Hola!"));
    assert_eq!(body["aiMessage"]["sender"], json!("ai"));
    assert!(body.get("error").is_none());

    // The transcript lists both turns in creation order, byte-for-byte.
    let (_, messages) = send_json(&app, Method::GET, "/api/messages", None).await;
    let messages = messages.as_array().expect("array").clone();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], json!(content));
    assert_eq!(messages[1]["content"], json!("¡Hola!"));
}

#[tokio::test]
async fn chat_send_degrades_to_the_stored_apology_when_upstream_is_unreachable() {
    // Non-routable endpoint: the gateway call fails, the request must not.
    let app = test_app("http://127.0.0.1:9/prediction/offline");

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "content": "hola", "sender": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["aiMessage"]["content"],
        json!(
            "Lo siento, no pude procesar tu consulta en este momento. \
             Por favor, intenta nuevamente más tarde."
        )
    );
    assert_eq!(body["error"], json!("AI service temporarily unavailable"));

    // Both turns were recorded despite the failure.
    let (_, messages) = send_json(&app, Method::GET, "/api/messages", None).await;
    assert_eq!(messages.as_array().expect("array").len(), 2);
}

#[tokio::test]
async fn chat_send_rejects_malformed_payloads() {
    let app = test_app("http://127.0.0.1:9/unused");

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "sender": "user" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid message data"));

    let (status, _) = send_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "content": "hola", "sender": "robot" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was persisted by the rejected sends.
    let (_, messages) = send_json(&app, Method::GET, "/api/messages", None).await;
    assert_eq!(messages.as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn clearing_messages_empties_the_transcript() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "ok" })))
        .mount(&upstream)
        .await;
    let app = test_app(&upstream.uri());

    send_json(
        &app,
        Method::POST,
        "/api/messages",
        Some(json!({ "content": "hola", "sender": "user" })),
    )
    .await;

    let (status, body) = send_json(&app, Method::DELETE, "/api/messages", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let (_, messages) = send_json(&app, Method::GET, "/api/messages", None).await;
    assert_eq!(messages.as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn upload_accepts_allowed_types_and_lists_most_recent_first() {
    let app = test_app("http://127.0.0.1:9/unused");

    let (status, first) = upload(&app, &[("uno.txt", "text/plain", b"contenido uno")]).await;
    assert_eq!(status, StatusCode::OK);
    let first = first.as_array().expect("array").clone();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0]["originalName"], json!("uno.txt"));
    assert_eq!(first[0]["mimeType"], json!("text/plain"));
    assert_eq!(first[0]["size"], json!("13"));
    let storage_url = first[0]["storageUrl"].as_str().expect("storageUrl");
    assert!(storage_url.starts_with("/uploads/"));

    // The bytes landed under the storage-assigned name.
    let filename = first[0]["filename"].as_str().expect("filename");
    let stored = app.uploads_dir.path().join(filename);
    assert_eq!(std::fs::read(&stored).expect("read stored"), b"contenido uno");

    let (status, _) = upload(&app, &[("dos.pdf", "application/pdf", b"%PDF-fake")]).await;
    assert_eq!(status, StatusCode::OK);

    let (_, files) = send_json(&app, Method::GET, "/api/files", None).await;
    let files = files.as_array().expect("array").clone();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["originalName"], json!("dos.pdf"));
    assert_eq!(files[1]["originalName"], json!("uno.txt"));
}

#[tokio::test]
async fn upload_rejects_disallowed_types_before_storage() {
    let app = test_app("http://127.0.0.1:9/unused");

    let (status, body) = upload(
        &app,
        &[
            ("bueno.txt", "text/plain", b"ok"),
            ("malo.zip", "application/zip", b"PK"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Invalid file type"));

    // Nothing reached the registry, and no stray bytes remain.
    let (_, files) = send_json(&app, Method::GET, "/api/files", None).await;
    assert_eq!(files.as_array().expect("array").len(), 0);
    let leftovers = std::fs::read_dir(app.uploads_dir.path())
        .expect("read uploads dir")
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn upload_enforces_the_file_count_limit() {
    let app = test_app("http://127.0.0.1:9/unused");
    let parts: Vec<(String, &str, &[u8])> = (0..6)
        .map(|index| (format!("archivo{index}.txt"), "text/plain", b"x".as_slice()))
        .collect();
    let borrowed: Vec<(&str, &str, &[u8])> = parts
        .iter()
        .map(|(name, mime, data)| (name.as_str(), *mime, *data))
        .collect();

    let (status, body) = upload(&app, &borrowed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("Too many files"));
}

#[tokio::test]
async fn upload_without_file_parts_is_rejected() {
    let app = test_app("http://127.0.0.1:9/unused");
    let (status, body) = upload(&app, &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("No files uploaded"));
}

#[tokio::test]
async fn deleting_a_file_is_scoped_and_idempotent() {
    let app = test_app("http://127.0.0.1:9/unused");

    let (_, uploaded) = upload(
        &app,
        &[
            ("uno.txt", "text/plain", b"uno"),
            ("dos.txt", "text/plain", b"dos"),
        ],
    )
    .await;
    let uploaded = uploaded.as_array().expect("array").clone();
    let target_id = uploaded[0]["id"].as_str().expect("id").to_string();
    let target_file = uploaded[0]["filename"].as_str().expect("filename").to_string();

    let (status, body) =
        send_json(&app, Method::DELETE, &format!("/api/files/{target_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    // Exactly the deleted record is gone, bytes included.
    let (_, files) = send_json(&app, Method::GET, "/api/files", None).await;
    let files = files.as_array().expect("array").clone();
    assert_eq!(files.len(), 1);
    assert_ne!(files[0]["id"].as_str().expect("id"), target_id);
    assert!(!app.uploads_dir.path().join(&target_file).exists());

    // Deleting the same id again still reports success.
    let (status, body) =
        send_json(&app, Method::DELETE, &format!("/api/files/{target_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}
