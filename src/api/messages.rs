// Chat endpoints. A send persists the user message, forwards it upstream and
// persists the reply; upstream failure becomes a stored apology so the log
// always records an AI-side turn.
use crate::api::errors::ApiError;
use crate::schemas::{Attachment, ChatMessage, NewMessage, Sender};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

const FALLBACK_AI_REPLY: &str = "Lo siento, no pude procesar tu consulta en este momento. \
Por favor, intenta nuevamente más tarde.";
const UPSTREAM_UNAVAILABLE: &str = "AI service temporarily unavailable";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/messages",
        get(list_messages).post(send_message).delete(clear_messages),
    )
}

#[derive(Debug, Deserialize)]
struct SendMessageRequest {
    content: String,
    #[allow(dead_code)]
    sender: Sender,
    #[serde(default)]
    attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResponse {
    user_message: ChatMessage,
    ai_message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn list_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let messages = state.storage.get_messages().map_err(|err| {
        error!("failed to load messages: {err}");
        ApiError::internal("Failed to get messages")
    })?;
    Ok(Json(messages))
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let Json(request) = payload.map_err(|_| ApiError::validation("Invalid message data"))?;

    let user_message = state
        .storage
        .create_message(NewMessage {
            content: request.content.clone(),
            sender: Sender::User,
            attachments: request.attachments.clone(),
        })
        .map_err(|err| {
            error!("failed to persist user message: {err}");
            ApiError::internal("Failed to process message")
        })?;

    let config = state.storage.get_config().map_err(|err| {
        error!("failed to load configuration for send: {err}");
        ApiError::internal("Failed to process message")
    })?;

    let attachments = request.attachments.unwrap_or_default();
    match state
        .assistant
        .ask(&request.content, &config.api_url, &config.api_key, &attachments)
        .await
    {
        Ok(reply) => {
            let ai_message = store_ai_reply(&state, reply.text)?;
            Ok(Json(SendMessageResponse {
                user_message,
                ai_message,
                error: None,
            }))
        }
        Err(err) => {
            warn!("assistant call failed, storing fallback reply: {err}");
            let ai_message = store_ai_reply(&state, FALLBACK_AI_REPLY.to_string())?;
            Ok(Json(SendMessageResponse {
                user_message,
                ai_message,
                error: Some(UPSTREAM_UNAVAILABLE.to_string()),
            }))
        }
    }
}

fn store_ai_reply(state: &AppState, content: String) -> Result<ChatMessage, ApiError> {
    state
        .storage
        .create_message(NewMessage {
            content,
            sender: Sender::Ai,
            attachments: None,
        })
        .map_err(|err| {
            error!("failed to persist ai message: {err}");
            ApiError::internal("Failed to process message")
        })
}

async fn clear_messages(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    state.storage.clear_messages().map_err(|err| {
        error!("failed to clear messages: {err}");
        ApiError::internal("Failed to clear messages")
    })?;
    Ok(Json(json!({ "success": true })))
}
