// In-memory repository. Serves two roles: the `memory` backend for tests and
// demos, and the process-held fallback side of `FallbackStorage`.
use crate::schemas::{AppConfig, ChatMessage, ConfigUpdate, NewFile, NewMessage, UploadedFile};
use crate::storage::StorageBackend;
use anyhow::Result;
use parking_lot::RwLock;

pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

struct Inner {
    config: AppConfig,
    messages: Vec<ChatMessage>,
    files: Vec<UploadedFile>,
}

impl MemoryStorage {
    pub fn new(defaults: AppConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                config: defaults,
                messages: Vec::new(),
                files: Vec::new(),
            }),
        }
    }

    /// Mirrors the durable row after a successful read/write so a later
    /// outage degrades to the most recently observed configuration.
    pub(crate) fn remember_config(&self, config: &AppConfig) {
        self.inner.write().config = config.clone();
    }
}

impl StorageBackend for MemoryStorage {
    fn ensure_initialized(&self) -> Result<()> {
        Ok(())
    }

    fn get_config(&self) -> Result<AppConfig> {
        Ok(self.inner.read().config.clone())
    }

    fn update_config(&self, update: &ConfigUpdate) -> Result<AppConfig> {
        let mut inner = self.inner.write();
        inner.config.apply(update);
        Ok(inner.config.clone())
    }

    fn get_messages(&self) -> Result<Vec<ChatMessage>> {
        Ok(self.inner.read().messages.clone())
    }

    fn create_message(&self, new: NewMessage) -> Result<ChatMessage> {
        let record = new.into_record();
        self.inner.write().messages.push(record.clone());
        Ok(record)
    }

    fn clear_messages(&self) -> Result<()> {
        self.inner.write().messages.clear();
        Ok(())
    }

    fn create_file(&self, new: NewFile) -> Result<UploadedFile> {
        let record = new.into_record();
        self.inner.write().files.push(record.clone());
        Ok(record)
    }

    fn get_files(&self) -> Result<Vec<UploadedFile>> {
        // Insertion order is oldest-first; the contract is most-recent-first.
        let mut files = self.inner.read().files.clone();
        files.reverse();
        Ok(files)
    }

    fn delete_file(&self, id: &str) -> Result<Option<UploadedFile>> {
        let mut inner = self.inner.write();
        let position = inner.files.iter().position(|file| file.id == id);
        Ok(position.map(|index| inner.files.remove(index)))
    }
}
