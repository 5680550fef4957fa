//! Session persistence
//!
//! The session loads persisted state on init and saves on every change
//! through an injected store, keeping the pipeline itself storage-agnostic.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::messages::Message;
use crate::{ChatterError, Result};

/// Default system prompt instructing the model to open replies with an
/// emotion tag the segmenter can extract
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a friendly avatar chat companion. Your replies are spoken aloud sentence by sentence while your avatar acts them out.

Start every reply with one emotion tag that matches its mood:
[neutral], [happy], [angry], [sad] or [relaxed]

Example:
[happy] That sounds wonderful! Tell me more.

Keep replies short and conversational, without code blocks, URLs or markup."#;

/// Everything restored between runs
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistedSession {
    pub system_prompt: String,
    pub log: Vec<Message>,
}

/// Injected persistence interface: load-on-init, save-on-change
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSession>>;

    fn save(&self, session: &PersistedSession) -> Result<()>;
}

/// JSON file-backed store
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&self.path)?;
        let session = serde_json::from_str(&data)
            .map_err(|e| ChatterError::PersistenceError(format!("Corrupt session file: {}", e)))?;

        debug!("Loaded persisted session from {}", self.path.display());
        Ok(Some(session))
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_string_pretty(session)
            .map_err(|e| ChatterError::PersistenceError(format!("Serialize failed: {}", e)))?;
        fs::write(&self.path, data)?;

        Ok(())
    }
}

/// In-memory store for tests and storage-less runs
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: Mutex<Option<PersistedSession>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Option<PersistedSession>> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        *self.inner.lock() = Some(session.clone());
        Ok(())
    }
}
