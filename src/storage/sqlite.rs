// SQLite persistence for the configuration row, chat log and file registry.
use crate::schemas::{
    AppConfig, Attachment, ChatMessage, ConfigUpdate, FontSize, NewFile, NewMessage, Sender,
    UploadedFile,
};
use crate::storage::StorageBackend;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SqliteStorage {
    db_path: PathBuf,
    defaults: AppConfig,
    initialized: AtomicBool,
    init_guard: Mutex<()>,
}

impl SqliteStorage {
    pub fn new(db_path: String, defaults: AppConfig) -> Self {
        let path = if db_path.trim().is_empty() {
            PathBuf::from("data/asistente.db")
        } else {
            PathBuf::from(db_path)
        };
        Self {
            db_path: path,
            defaults,
            initialized: AtomicBool::new(false),
            init_guard: Mutex::new(()),
        }
    }

    fn open(&self) -> Result<Connection> {
        self.ensure_initialized()?;
        self.connect()
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&self.db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        Ok(conn)
    }

    fn read_config(conn: &Connection) -> Result<Option<AppConfig>> {
        let row = conn
            .query_row(
                "SELECT id, app_title, subtitle, primary_color, font_size, api_url, api_key, \
                 require_user_password, user_password, admin_password, updated_at \
                 FROM app_config WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, bool>(7)?,
                        row.get::<_, Option<String>>(8)?,
                        row.get::<_, String>(9)?,
                        row.get::<_, String>(10)?,
                    ))
                },
            )
            .optional()?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(AppConfig {
            id: row.0,
            app_title: row.1,
            subtitle: row.2,
            primary_color: row.3,
            font_size: FontSize::parse(&row.4)
                .ok_or_else(|| anyhow!("invalid font_size in app_config: {}", row.4))?,
            api_url: row.5,
            api_key: row.6,
            require_user_password: row.7,
            user_password: row.8,
            admin_password: row.9,
            updated_at: parse_timestamp(&row.10)?,
        }))
    }

    fn write_config(conn: &Connection, config: &AppConfig) -> Result<()> {
        conn.execute(
            "INSERT INTO app_config (id, app_title, subtitle, primary_color, font_size, api_url, \
             api_key, require_user_password, user_password, admin_password, updated_at) \
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT(id) DO UPDATE SET app_title = ?1, subtitle = ?2, primary_color = ?3, \
             font_size = ?4, api_url = ?5, api_key = ?6, require_user_password = ?7, \
             user_password = ?8, admin_password = ?9, updated_at = ?10",
            params![
                config.app_title,
                config.subtitle,
                config.primary_color,
                config.font_size.as_str(),
                config.api_url,
                config.api_key,
                config.require_user_password,
                config.user_password,
                config.admin_password,
                config.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl StorageBackend for SqliteStorage {
    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let _guard = self.init_guard.lock();
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS app_config (
              id INTEGER PRIMARY KEY CHECK (id = 1),
              app_title TEXT NOT NULL,
              subtitle TEXT NOT NULL,
              primary_color TEXT NOT NULL,
              font_size TEXT NOT NULL,
              api_url TEXT NOT NULL,
              api_key TEXT NOT NULL,
              require_user_password INTEGER NOT NULL,
              user_password TEXT,
              admin_password TEXT NOT NULL,
              updated_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS chat_messages (
              id TEXT PRIMARY KEY,
              content TEXT NOT NULL,
              sender TEXT NOT NULL,
              attachments TEXT,
              created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS uploaded_files (
              id TEXT PRIMARY KEY,
              filename TEXT NOT NULL,
              original_name TEXT NOT NULL,
              mime_type TEXT NOT NULL,
              size TEXT NOT NULL,
              storage_url TEXT NOT NULL,
              uploaded_at TEXT NOT NULL
            );
            "#,
        )?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn get_config(&self) -> Result<AppConfig> {
        let conn = self.open()?;
        if let Some(config) = Self::read_config(&conn)? {
            return Ok(config);
        }
        // First access creates the row with the documented defaults.
        let mut config = self.defaults.clone();
        config.updated_at = Utc::now();
        Self::write_config(&conn, &config)?;
        Ok(config)
    }

    fn update_config(&self, update: &ConfigUpdate) -> Result<AppConfig> {
        let conn = self.open()?;
        let mut config = match Self::read_config(&conn)? {
            Some(config) => config,
            None => self.defaults.clone(),
        };
        config.apply(update);
        Self::write_config(&conn, &config)?;
        Ok(config)
    }

    fn get_messages(&self) -> Result<Vec<ChatMessage>> {
        let conn = self.open()?;
        let mut statement = conn.prepare(
            "SELECT id, content, sender, attachments, created_at FROM chat_messages \
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut messages = Vec::new();
        for row in rows {
            let (id, content, sender, attachments, created_at) = row?;
            messages.push(ChatMessage {
                id,
                content,
                sender: Sender::parse(&sender)
                    .ok_or_else(|| anyhow!("invalid sender in chat_messages: {sender}"))?,
                attachments: parse_attachments(attachments.as_deref()),
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(messages)
    }

    fn create_message(&self, new: NewMessage) -> Result<ChatMessage> {
        let conn = self.open()?;
        let record = new.into_record();
        let attachments = record
            .attachments
            .as_ref()
            .map(|list| serde_json::to_string(list))
            .transpose()?;
        conn.execute(
            "INSERT INTO chat_messages (id, content, sender, attachments, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.id,
                record.content,
                record.sender.as_str(),
                attachments,
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(record)
    }

    fn clear_messages(&self) -> Result<()> {
        let conn = self.open()?;
        conn.execute("DELETE FROM chat_messages", [])?;
        Ok(())
    }

    fn create_file(&self, new: NewFile) -> Result<UploadedFile> {
        let conn = self.open()?;
        let record = new.into_record();
        conn.execute(
            "INSERT INTO uploaded_files (id, filename, original_name, mime_type, size, \
             storage_url, uploaded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.filename,
                record.original_name,
                record.mime_type,
                record.size,
                record.storage_url,
                record.uploaded_at.to_rfc3339(),
            ],
        )?;
        Ok(record)
    }

    fn get_files(&self) -> Result<Vec<UploadedFile>> {
        let conn = self.open()?;
        let mut statement = conn.prepare(
            "SELECT id, filename, original_name, mime_type, size, storage_url, uploaded_at \
             FROM uploaded_files ORDER BY uploaded_at DESC, rowid DESC",
        )?;
        let rows = statement.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;
        let mut files = Vec::new();
        for row in rows {
            let (id, filename, original_name, mime_type, size, storage_url, uploaded_at) = row?;
            files.push(UploadedFile {
                id,
                filename,
                original_name,
                mime_type,
                size,
                storage_url,
                uploaded_at: parse_timestamp(&uploaded_at)?,
            });
        }
        Ok(files)
    }

    fn delete_file(&self, id: &str) -> Result<Option<UploadedFile>> {
        let conn = self.open()?;
        let existing = conn
            .query_row(
                "SELECT id, filename, original_name, mime_type, size, storage_url, uploaded_at \
                 FROM uploaded_files WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                },
            )
            .optional()?;
        conn.execute("DELETE FROM uploaded_files WHERE id = ?1", params![id])?;
        let Some(row) = existing else {
            return Ok(None);
        };
        Ok(Some(UploadedFile {
            id: row.0,
            filename: row.1,
            original_name: row.2,
            mime_type: row.3,
            size: row.4,
            storage_url: row.5,
            uploaded_at: parse_timestamp(&row.6)?,
        }))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .map_err(|err| anyhow!("invalid timestamp {value}: {err}"))?
        .with_timezone(&Utc))
}

fn parse_attachments(value: Option<&str>) -> Option<Vec<Attachment>> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    serde_json::from_str::<Vec<Attachment>>(raw).ok()
}
