//! Persistent storage backends for the conversation collection
//!
//! The store treats the backend as the sole source of truth at startup and
//! the sole durable sink thereafter: every mutation serializes the full
//! collection and active pointer ([`PersistedState`]) and writes it through.
//!
//! Two backends are provided: an embedded `sled` database for real use and
//! an in-memory backend for tests and tooling.

use crate::error::{ConvokeError, Result};
use crate::types::Conversation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

/// Key under which the serialized state lives in the sled tree
const STATE_KEY: &[u8] = b"conversations";

/// Full persisted snapshot of the conversation collection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    /// Every known conversation, insertion order preserved
    pub conversations: Vec<Conversation>,
    /// Id of the active conversation, if any
    pub active_id: Option<String>,
}

/// Asynchronous key-value persistence surface
///
/// `load` returns `None` on first run; `save` replaces the previous snapshot
/// wholesale (write-through, no partial updates).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the persisted snapshot, if one exists
    async fn load(&self) -> Result<Option<PersistedState>>;

    /// Replace the persisted snapshot
    async fn save(&self, state: &PersistedState) -> Result<()>;
}

/// Embedded `sled` storage backend
///
/// Stores the whole snapshot as a single JSON value and flushes after every
/// write so a crash never loses an acknowledged mutation.
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Open or create the database at `path`
    ///
    /// # Errors
    ///
    /// Returns `ConvokeError::Storage` if the database cannot be opened
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use convoke::storage::SledBackend;
    ///
    /// # fn main() -> convoke::error::Result<()> {
    /// let backend = SledBackend::new("/tmp/convoke.db")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)
            .map_err(|e| ConvokeError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl StorageBackend for SledBackend {
    async fn load(&self) -> Result<Option<PersistedState>> {
        match self
            .db
            .get(STATE_KEY)
            .map_err(|e| ConvokeError::Storage(format!("Get failed: {}", e)))?
        {
            Some(bytes) => {
                let state = serde_json::from_slice(&bytes)
                    .map_err(|e| ConvokeError::Storage(format!("Deserialization failed: {}", e)))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        let value = serde_json::to_vec(state)
            .map_err(|e| ConvokeError::Storage(format!("Serialization failed: {}", e)))?;

        self.db
            .insert(STATE_KEY, value)
            .map_err(|e| ConvokeError::Storage(format!("Insert failed: {}", e)))?;

        self.db
            .flush_async()
            .await
            .map_err(|e| ConvokeError::Storage(format!("Flush failed: {}", e)))?;

        Ok(())
    }
}

/// In-memory storage backend for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-seeded with a snapshot
    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.state.lock().expect("memory backend poisoned").clone())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock().expect("memory backend poisoned") = Some(state.clone());
        Ok(())
    }
}
