//! Session persistence
//!
//! The token and last-known user are stored under one fixed name
//! ([`SESSION_STORAGE_KEY`]). The cached user is a display hint only: role
//! decisions always use the user returned by the API.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::core::auth::User;

/// Fixed storage name for the persisted session
pub const SESSION_STORAGE_KEY: &str = "agrimarket_session";

/// Persisted session marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub token: String,
    pub user: User,
}

/// Session storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Persisted session is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Where the session marker lives between runs
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<PersistedSession>, StoreError>;

    fn save(&self, session: &PersistedSession) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store; the session ends with the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with a session, as if left by a previous run
    pub fn with_session(session: PersistedSession) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// JSON file `<dir>/agrimarket_session.json`
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{SESSION_STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(session)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
