// Storage backends for the configuration row, chat log and file registry.

mod fallback;
mod memory;
mod sqlite;

use crate::config::Config;
use crate::schemas::{AppConfig, ChatMessage, ConfigUpdate, NewFile, NewMessage, UploadedFile};
use anyhow::{anyhow, Result};
use std::sync::Arc;

pub use fallback::FallbackStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// Persistence contract shared by the durable and in-memory backends.
///
/// Implementations may fail; the degrade-to-fallback policy (never fail the
/// caller) lives in [`FallbackStorage`], not here.
pub trait StorageBackend: Send + Sync {
    fn ensure_initialized(&self) -> Result<()>;

    fn get_config(&self) -> Result<AppConfig>;
    fn update_config(&self, update: &ConfigUpdate) -> Result<AppConfig>;

    fn get_messages(&self) -> Result<Vec<ChatMessage>>;
    fn create_message(&self, new: NewMessage) -> Result<ChatMessage>;
    fn clear_messages(&self) -> Result<()>;

    fn create_file(&self, new: NewFile) -> Result<UploadedFile>;
    fn get_files(&self) -> Result<Vec<UploadedFile>>;
    fn delete_file(&self, id: &str) -> Result<Option<UploadedFile>>;
}

/// Builds the storage stack for the process. The durable backend is always
/// wrapped in [`FallbackStorage`] so a storage outage degrades instead of
/// failing requests; `memory` runs without durability at all.
pub fn build_storage(config: &Config) -> Result<Arc<dyn StorageBackend>> {
    let defaults = AppConfig::default_row(&config.assistant);
    let backend = config.storage.backend.trim().to_lowercase();
    let backend = if backend.is_empty() {
        "sqlite".to_string()
    } else {
        backend
    };
    match backend.as_str() {
        "sqlite" | "default" => {
            let durable = SqliteStorage::new(config.storage.db_path.clone(), defaults.clone());
            Ok(Arc::new(FallbackStorage::new(
                Arc::new(durable),
                MemoryStorage::new(defaults),
            )))
        }
        "memory" => Ok(Arc::new(MemoryStorage::new(defaults))),
        other => Err(anyhow!("unknown storage backend: {other}")),
    }
}
