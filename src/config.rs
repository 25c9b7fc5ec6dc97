// Process configuration loaded from YAML with environment overrides.
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub uploads: UploadsConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    pub allow_origins: Option<Vec<String>>,
    pub allow_methods: Option<Vec<String>>,
    pub allow_headers: Option<Vec<String>>,
    pub allow_credentials: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            db_path: "data/asistente.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadsConfig {
    pub dir: String,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: "data/uploads".to_string(),
        }
    }
}

/// Seeds for the assistant fields of the first configuration row, plus the
/// upstream request timeout. The row itself lives in storage afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub default_api_url: String,
    pub default_api_key: String,
    pub timeout_s: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            default_api_url: String::new(),
            default_api_key: String::new(),
            timeout_s: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

pub fn load_config() -> Config {
    let path =
        env::var("ASISTENTE_CONFIG_PATH").unwrap_or_else(|_| "config/asistente.yaml".to_string());
    read_config(&path)
}

fn read_config(path: &str) -> Config {
    // The config file is allowed to be absent so a fresh checkout still boots.
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return Config::default(),
    };
    serde_yaml::from_str::<Config>(&content).unwrap_or_else(|err| {
        warn!("failed to parse config {path}, using defaults: {err}");
        Config::default()
    })
}

pub fn bind_address(config: &Config) -> String {
    // Environment overrides keep containerized deployments simple.
    let host = env::var("ASISTENTE_HOST").unwrap_or_else(|_| config.server.host.clone());
    let port = env::var("ASISTENTE_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.server.port);
    format!("{host}:{port}")
}
