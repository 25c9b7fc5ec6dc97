// Upstream assistant client: forwards a question (plus inline uploads) to the
// configured prediction endpoint and normalizes the reply.
use crate::schemas::Attachment;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

const NO_REPLY_PLACEHOLDER: &str = "No response from AI assistant";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("assistant endpoint returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("assistant request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct AssistantReply {
    pub text: String,
    pub source_documents: Option<Value>,
    pub follow_up_prompts: Option<Value>,
}

#[derive(Clone)]
pub struct AssistantClient {
    http: Client,
}

impl AssistantClient {
    pub fn new(timeout_s: u64) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_s))
            .build()?;
        Ok(Self { http })
    }

    /// Sends one prediction request. Attachment content travels inline in the
    /// JSON body; there is no separate upload step on the gateway side.
    pub async fn ask(
        &self,
        question: &str,
        endpoint: &str,
        credential: &str,
        attachments: &[Attachment],
    ) -> Result<AssistantReply, AssistantError> {
        let mut request = self
            .http
            .post(endpoint)
            .json(&build_payload(question, attachments));
        if !credential.trim().is_empty() {
            request = request.bearer_auth(credential);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let body: Value = response.json().await?;
        Ok(normalize_reply(&body))
    }
}

fn build_payload(question: &str, attachments: &[Attachment]) -> Value {
    let mut payload = json!({ "question": question });
    if !attachments.is_empty() {
        let uploads: Vec<Value> = attachments
            .iter()
            .map(|attachment| {
                json!({
                    "name": attachment.name,
                    "type": attachment.kind.as_deref().unwrap_or("file"),
                    "data": attachment
                        .data
                        .as_deref()
                        .or(attachment.url.as_deref())
                        .unwrap_or(""),
                    "mime": attachment.mime,
                })
            })
            .collect();
        payload["uploads"] = Value::Array(uploads);
    }
    payload
}

fn normalize_reply(body: &Value) -> AssistantReply {
    let text = body
        .get("text")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            body.get("message")
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
        })
        .unwrap_or(NO_REPLY_PLACEHOLDER)
        .to_string();
    AssistantReply {
        text,
        source_documents: body.get("sourceDocuments").cloned(),
        follow_up_prompts: body.get("followUpPrompts").cloned(),
    }
}
