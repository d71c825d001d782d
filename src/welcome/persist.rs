//! On-disk form of the welcome store.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::store::WelcomeStore;

/// Errors raised while saving the store.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to write state file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Saved state of one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentChat {
    pub chat_id: i64,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Toggles and cooldowns that survive restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentStore {
    #[serde(default)]
    pub chats: Vec<PersistentChat>,
}

impl PersistentStore {
    /// Loads state from a JSON file, returns default if missing or unreadable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Saves state to a JSON file.
    ///
    /// The JSON goes to a sibling `.tmp` file first and is renamed over
    /// `path`, so readers never see a partial write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// State file shared by every writer of the welcome store.
///
/// Saves are serialized, and each one snapshots the store while holding
/// the lock, so the last save on disk always includes every change made
/// before it started.
#[derive(Debug)]
pub struct StateFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateFile {
    /// Creates a handle for the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the saved state, empty if missing or unreadable.
    #[must_use]
    pub fn load(&self) -> PersistentStore {
        PersistentStore::load(&self.path)
    }

    /// Snapshots `store` and writes it. Blocks on file I/O.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded or written.
    pub fn save(&self, store: &WelcomeStore) -> Result<(), PersistError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        store.snapshot().save(&self.path)
    }

    /// Saves `store` on the blocking pool. Failures are logged.
    pub async fn persist(self: Arc<Self>, store: Arc<WelcomeStore>) {
        match tokio::task::spawn_blocking(move || self.save(&store)).await {
            Ok(Ok(())) => debug!("Welcome state saved"),
            Ok(Err(e)) => warn!("Failed to save welcome state: {}", e),
            Err(e) => warn!("Welcome state save task failed: {}", e),
        }
    }
}
