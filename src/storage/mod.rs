//! Persistence Adapter
//!
//! One document record and one theme preference in an origin-scoped
//! key-value store. Reads fail soft, writes never raise.

pub mod file;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::theme::Theme;

pub use file::FileStore;

/// Key holding the serialized document record
pub const DOCUMENT_KEY: &str = "text-editor-doc-v1";

/// Key holding the raw theme string
pub const THEME_KEY: &str = "text-editor-theme";

/// Durable string key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Volatile store, mainly for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    /// When set, every write fails as if the quota were exceeded
    read_only: bool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    /// Write a raw value, bypassing the read-only flag
    pub fn seed(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    /// Successful `set` calls so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.read_only {
            anyhow::bail!("storage quota exceeded writing {}", key);
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.read_only {
            anyhow::bail!("storage is read-only, cannot remove {}", key);
        }
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// The last durably saved document state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Canonical HTML of the document
    #[serde(rename = "html")]
    pub content: String,
    /// Epoch milliseconds at save time
    #[serde(rename = "ts")]
    pub saved_at: i64,
}

impl DocumentRecord {
    /// A record of `content` stamped with the current time
    pub fn snapshot(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            saved_at: now_millis(),
        }
    }
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

/// Typed access to the editor's two persisted records
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persistence over a fresh in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// The stored document record, or `None` if it is missing or unreadable
    pub fn load(&self) -> Option<DocumentRecord> {
        let raw = match self.store.get(DOCUMENT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Failed to read document record: {}", e);
                return None;
            }
        };
        match serde_json::from_str::<DocumentRecord>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Ignoring corrupt document record: {}", e);
                None
            }
        }
    }

    /// Write the record; storage errors are logged and swallowed
    pub fn save(&self, record: &DocumentRecord) {
        let result = serde_json::to_string(record)
            .map_err(anyhow::Error::from)
            .and_then(|raw| self.store.set(DOCUMENT_KEY, &raw));
        match result {
            Ok(()) => log::debug!("Saved document ({} bytes)", record.content.len()),
            Err(e) => log::warn!("Failed to save document: {}", e),
        }
    }

    /// Remove the stored document record
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(DOCUMENT_KEY) {
            log::warn!("Failed to remove document record: {}", e);
        }
    }

    /// The stored theme, `Light` when absent or unrecognised
    pub fn load_theme(&self) -> Theme {
        match self.store.get(THEME_KEY) {
            Ok(Some(raw)) => Theme::parse(&raw).unwrap_or_else(|| {
                log::warn!("Unknown theme '{}', using light", raw);
                Theme::default()
            }),
            Ok(None) => Theme::default(),
            Err(e) => {
                log::warn!("Failed to read theme: {}", e);
                Theme::default()
            }
        }
    }

    pub fn save_theme(&self, theme: Theme) {
        if let Err(e) = self.store.set(THEME_KEY, theme.as_str()) {
            log::warn!("Failed to save theme: {}", e);
        }
    }
}
