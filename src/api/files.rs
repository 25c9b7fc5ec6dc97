// File registry endpoints: bounded multipart upload, listing, deletion.
// Uploaded bytes live under the uploads directory with storage-assigned
// names and are served back verbatim by the static mount.
use crate::api::errors::ApiError;
use crate::schemas::{NewFile, UploadedFile};
use crate::state::AppState;
use axum::extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use mime::Mime;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};
use uuid::Uuid;

const MAX_UPLOAD_FILES: usize = 5;
const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
// Body ceiling leaves headroom for multipart framing around five full files.
const MAX_REQUEST_BYTES: usize = MAX_UPLOAD_FILES * MAX_FILE_BYTES + 1024 * 1024;

const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "image/jpeg",
    "image/png",
    "image/gif",
    "text/plain",
];

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/files",
            get(list_files)
                .post(upload_files)
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES)),
        )
        .route("/api/files/{id}", delete(delete_file))
}

struct SavedUpload {
    path: PathBuf,
    new_file: NewFile,
}

async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadedFile>>, ApiError> {
    let mut saved: Vec<SavedUpload> = Vec::new();

    while let Some(mut field) = multipart.next_field().await.map_err(|err| {
        cleanup_uploads(&saved);
        ApiError::validation(err.to_string())
    })? {
        if field.name() != Some("files") {
            continue;
        }
        // File parts without usable metadata are skipped, not fatal.
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        if original_name.trim().is_empty() {
            continue;
        }
        if saved.len() >= MAX_UPLOAD_FILES {
            cleanup_uploads(&saved);
            return Err(ApiError::validation("Too many files"));
        }
        let mime_type = field
            .content_type()
            .and_then(|value| Mime::from_str(value).ok())
            .map(|mime| mime.essence_str().to_string());
        let Some(mime_type) = mime_type.filter(|value| is_allowed_mime(value)) else {
            // Rejected at the transport boundary; nothing reaches storage.
            cleanup_uploads(&saved);
            return Err(ApiError::validation("Invalid file type"));
        };

        let filename = Uuid::new_v4().simple().to_string();
        let target = state.uploads_dir.join(&filename);
        let size = match write_bounded(&mut field, &target).await {
            Ok(size) => size,
            Err(err) => {
                let _ = tokio::fs::remove_file(&target).await;
                cleanup_uploads(&saved);
                return Err(err);
            }
        };

        saved.push(SavedUpload {
            path: target,
            new_file: NewFile {
                storage_url: format!("/uploads/{filename}"),
                filename,
                original_name,
                mime_type,
                size: size.to_string(),
            },
        });
    }

    if saved.is_empty() {
        return Err(ApiError::validation("No files uploaded"));
    }

    let mut uploaded = Vec::with_capacity(saved.len());
    for upload in saved {
        let record = state
            .storage
            .create_file(upload.new_file)
            .map_err(|err| {
                error!("failed to persist uploaded file: {err}");
                ApiError::internal("Failed to upload files")
            })?;
        uploaded.push(record);
    }
    Ok(Json(uploaded))
}

async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UploadedFile>>, ApiError> {
    let files = state.storage.get_files().map_err(|err| {
        error!("failed to list files: {err}");
        ApiError::internal("Failed to get files")
    })?;
    Ok(Json(files))
}

async fn delete_file(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.storage.delete_file(&id).map_err(|err| {
        error!("failed to delete file {id}: {err}");
        ApiError::internal("Failed to delete file")
    })?;
    if let Some(record) = removed {
        // The registry row is authoritative; stray bytes are only a warning.
        let path = state.uploads_dir.join(&record.filename);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!("failed to remove stored bytes {}: {err}", path.display());
        }
    }
    Ok(Json(json!({ "success": true })))
}

fn is_allowed_mime(value: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&value)
}

async fn write_bounded(
    field: &mut axum::extract::multipart::Field<'_>,
    target: &PathBuf,
) -> Result<usize, ApiError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?;
    }
    let mut file = tokio::fs::File::create(target)
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    let mut written = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|err| ApiError::validation(err.to_string()))?
    {
        written += chunk.len();
        if written > MAX_FILE_BYTES {
            return Err(ApiError::validation("File too large"));
        }
        file.write_all(&chunk)
            .await
            .map_err(|err| ApiError::internal(err.to_string()))?;
    }
    file.flush()
        .await
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(written)
}

fn cleanup_uploads(saved: &[SavedUpload]) {
    for upload in saved {
        let _ = std::fs::remove_file(&upload.path);
    }
}
