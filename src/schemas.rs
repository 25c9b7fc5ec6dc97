// Domain records and typed request payloads. Wire JSON is camelCase.
use crate::config::AssistantConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    Medium,
    Large,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "small" => Some(FontSize::Small),
            "medium" => Some(FontSize::Medium),
            "large" => Some(FontSize::Large),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Ai => "ai",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Sender::User),
            "ai" => Some(Sender::Ai),
            _ => None,
        }
    }
}

/// File carried inline with a chat message. `data` holds an inline-encoded
/// data URL produced by the client; `url` is the stored alternative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub mime: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// The singleton branding and security configuration row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub id: i64,
    pub app_title: String,
    pub subtitle: String,
    pub primary_color: String,
    pub font_size: FontSize,
    pub api_url: String,
    pub api_key: String,
    pub require_user_password: bool,
    pub user_password: Option<String>,
    pub admin_password: String,
    pub updated_at: DateTime<Utc>,
}

impl AppConfig {
    /// Fixed defaults used when the row is first created.
    pub fn default_row(assistant: &AssistantConfig) -> Self {
        Self {
            id: 1,
            app_title: "Asistente IA - Compras Públicas".to_string(),
            subtitle: "Armada de Chile".to_string(),
            primary_color: "#1e3a8a".to_string(),
            font_size: FontSize::Medium,
            api_url: assistant.default_api_url.clone(),
            api_key: assistant.default_api_key.clone(),
            require_user_password: false,
            user_password: None,
            admin_password: "admin123".to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn apply(&mut self, update: &ConfigUpdate) {
        if let Some(value) = &update.app_title {
            self.app_title = value.clone();
        }
        if let Some(value) = &update.subtitle {
            self.subtitle = value.clone();
        }
        if let Some(value) = &update.primary_color {
            self.primary_color = value.clone();
        }
        if let Some(value) = update.font_size {
            self.font_size = value;
        }
        if let Some(value) = &update.api_url {
            self.api_url = value.clone();
        }
        if let Some(value) = &update.api_key {
            self.api_key = value.clone();
        }
        if let Some(value) = update.require_user_password {
            self.require_user_password = value;
        }
        if let Some(value) = &update.user_password {
            self.user_password = value.clone();
        }
        if let Some(value) = &update.admin_password {
            self.admin_password = value.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Client-facing view of the configuration row with secrets stripped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub id: i64,
    pub app_title: String,
    pub subtitle: String,
    pub primary_color: String,
    pub font_size: FontSize,
    pub api_url: String,
    pub require_user_password: bool,
    pub user_password: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppConfig> for PublicConfig {
    fn from(config: AppConfig) -> Self {
        Self {
            id: config.id,
            app_title: config.app_title,
            subtitle: config.subtitle,
            primary_color: config.primary_color,
            font_size: config.font_size,
            api_url: config.api_url,
            require_user_password: config.require_user_password,
            user_password: config.user_password,
            updated_at: config.updated_at,
        }
    }
}

/// Partial configuration update. `user_password` distinguishes "absent"
/// (outer None, keep current) from an explicit null (clear the password).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdate {
    #[serde(default)]
    pub app_title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
    #[serde(default)]
    pub font_size: Option<FontSize>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub require_user_password: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub user_password: Option<Option<String>>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub content: String,
    pub sender: Sender,
    pub attachments: Option<Vec<Attachment>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub content: String,
    pub sender: Sender,
    pub attachments: Option<Vec<Attachment>>,
}

impl NewMessage {
    /// Builds the full record a backend persists, with a fresh id and
    /// timestamp. Failed backends return the same shape non-durably.
    pub fn into_record(self) -> ChatMessage {
        ChatMessage {
            id: Uuid::new_v4().to_string(),
            content: self.content,
            sender: self.sender,
            attachments: self.attachments,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: String,
    pub storage_url: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: String,
    pub storage_url: String,
}

impl NewFile {
    pub fn into_record(self) -> UploadedFile {
        UploadedFile {
            id: Uuid::new_v4().to_string(),
            filename: self.filename,
            original_name: self.original_name,
            mime_type: self.mime_type,
            size: self.size,
            storage_url: self.storage_url,
            uploaded_at: Utc::now(),
        }
    }
}
