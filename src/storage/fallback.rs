// Degrading wrapper: durable backend first, in-memory fallback on failure.
//
// The availability-over-consistency policy from the storage contract lives
// here: reads degrade to empty/default results, writes return synthesized
// records that are not durable, and callers never see the failure. The
// transition itself is logged so operators can detect the outage.
use crate::schemas::{AppConfig, ChatMessage, ConfigUpdate, NewFile, NewMessage, UploadedFile};
use crate::storage::{MemoryStorage, StorageBackend};
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct FallbackStorage {
    durable: Arc<dyn StorageBackend>,
    memory: MemoryStorage,
    degraded: AtomicBool,
}

impl FallbackStorage {
    pub fn new(durable: Arc<dyn StorageBackend>, memory: MemoryStorage) -> Self {
        Self {
            durable,
            memory,
            degraded: AtomicBool::new(false),
        }
    }

    fn note_failure(&self, operation: &str, err: &anyhow::Error) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!("durable storage degraded, serving from memory fallback ({operation}): {err}");
        } else {
            warn!("durable storage still degraded ({operation}): {err}");
        }
    }

    fn note_success(&self) {
        if self.degraded.swap(false, Ordering::SeqCst) {
            info!("durable storage recovered");
        }
    }
}

impl StorageBackend for FallbackStorage {
    fn ensure_initialized(&self) -> Result<()> {
        // Startup must not fail on a storage outage; the first successful
        // operation initializes the durable backend lazily instead.
        if let Err(err) = self.durable.ensure_initialized() {
            self.note_failure("ensure_initialized", &err);
        }
        Ok(())
    }

    fn get_config(&self) -> Result<AppConfig> {
        match self.durable.get_config() {
            Ok(config) => {
                self.note_success();
                self.memory.remember_config(&config);
                Ok(config)
            }
            Err(err) => {
                self.note_failure("get_config", &err);
                self.memory.get_config()
            }
        }
    }

    fn update_config(&self, update: &ConfigUpdate) -> Result<AppConfig> {
        match self.durable.update_config(update) {
            Ok(config) => {
                self.note_success();
                self.memory.remember_config(&config);
                Ok(config)
            }
            Err(err) => {
                // Best-effort durability: the merge still happens in memory so
                // the current session keeps working.
                self.note_failure("update_config", &err);
                self.memory.update_config(update)
            }
        }
    }

    fn get_messages(&self) -> Result<Vec<ChatMessage>> {
        match self.durable.get_messages() {
            Ok(messages) => {
                self.note_success();
                Ok(messages)
            }
            Err(err) => {
                self.note_failure("get_messages", &err);
                Ok(Vec::new())
            }
        }
    }

    fn create_message(&self, new: NewMessage) -> Result<ChatMessage> {
        match self.durable.create_message(new.clone()) {
            Ok(record) => {
                self.note_success();
                Ok(record)
            }
            Err(err) => {
                self.note_failure("create_message", &err);
                Ok(new.into_record())
            }
        }
    }

    fn clear_messages(&self) -> Result<()> {
        if let Err(err) = self.durable.clear_messages() {
            self.note_failure("clear_messages", &err);
        } else {
            self.note_success();
        }
        Ok(())
    }

    fn create_file(&self, new: NewFile) -> Result<UploadedFile> {
        match self.durable.create_file(new.clone()) {
            Ok(record) => {
                self.note_success();
                Ok(record)
            }
            Err(err) => {
                self.note_failure("create_file", &err);
                Ok(new.into_record())
            }
        }
    }

    fn get_files(&self) -> Result<Vec<UploadedFile>> {
        match self.durable.get_files() {
            Ok(files) => {
                self.note_success();
                Ok(files)
            }
            Err(err) => {
                self.note_failure("get_files", &err);
                Ok(Vec::new())
            }
        }
    }

    fn delete_file(&self, id: &str) -> Result<Option<UploadedFile>> {
        match self.durable.delete_file(id) {
            Ok(removed) => {
                self.note_success();
                Ok(removed)
            }
            Err(err) => {
                self.note_failure("delete_file", &err);
                Ok(None)
            }
        }
    }
}
