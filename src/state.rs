// Shared application state wired at startup.
use crate::assistant::AssistantClient;
use crate::config::Config;
use crate::storage::{build_storage, StorageBackend};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn StorageBackend>,
    pub assistant: AssistantClient,
    pub uploads_dir: PathBuf,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let storage = build_storage(&config)?;
        // A storage outage degrades, it must not abort startup.
        storage.ensure_initialized()?;
        let assistant =
            AssistantClient::new(config.assistant.timeout_s).context("assistant client init")?;
        let uploads_dir = PathBuf::from(config.uploads.dir.trim());
        std::fs::create_dir_all(&uploads_dir)
            .with_context(|| format!("create uploads dir {}", uploads_dir.display()))?;
        Ok(Self {
            config,
            storage,
            assistant,
            uploads_dir,
        })
    }
}
