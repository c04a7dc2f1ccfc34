//! Durable, key-scoped storage for store state.
//!
//! [`PersistentStore`] never fails: every backend error is logged and
//! swallowed, so a store keeps working in memory when the medium is
//! read-only, full, or missing. Only each state's durable projection (see
//! [`Persisted`]) is written.
//!
//! Stores save through a [`WriteBehind`] queue: inside a tokio runtime the
//! file I/O runs on a background task, never on the task that mutated the
//! store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::StorageError;

/// Key prefix for every persisted store.
pub const STORAGE_NAMESPACE: &str = "shopfront";

/// Schema version written into every envelope.
const ENVELOPE_VERSION: u32 = 1;

/// A state type with a persisted projection.
pub trait Persisted {
    /// Logical store name (the storage key, before namespacing).
    const NAME: &'static str;

    /// Whitelisted subset of the state that survives a reload.
    type Durable: Serialize + DeserializeOwned + Default;

    /// Project the state onto its durable fields.
    fn to_durable(&self) -> Self::Durable;

    /// Rebuild a state from its durable fields.
    fn from_durable(durable: Self::Durable) -> Self;
}

/// Raw key-value medium.
pub trait StorageBackend: Send + Sync {
    /// Read a value, `Ok(None)` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium refuses the write.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete a value. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the medium cannot be modified.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Versioned wrapper around a durable projection.
#[derive(Serialize, Deserialize)]
struct Envelope<D> {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    state: D,
}

/// Fail-silent persistence for named stores.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn StorageBackend>,
    namespace: String,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl PersistentStore {
    /// Create a persistent store over `backend`, prefixing keys with `namespace`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// In-memory persistence, useful for tests and ephemeral sessions.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::default()), STORAGE_NAMESPACE)
    }

    fn key(&self, name: &str) -> String {
        format!("{}:{name}", self.namespace)
    }

    /// Load a store's durable state.
    ///
    /// Returns `None` if nothing is stored, the medium fails, or the payload
    /// cannot be decoded. Missing fields take their defaults.
    #[must_use]
    pub fn load<D: DeserializeOwned + Default>(&self, name: &str) -> Option<D> {
        let key = self.key(name);
        let raw = match self.backend.read(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(store = name, error = %e, "Failed to read persisted state");
                return None;
            }
        };

        match serde_json::from_str::<Envelope<D>>(&raw) {
            Ok(envelope) => {
                if envelope.version > ENVELOPE_VERSION {
                    debug!(
                        store = name,
                        version = envelope.version,
                        "Persisted state written by a newer version"
                    );
                }
                Some(envelope.state)
            }
            Err(e) => {
                warn!(store = name, error = %e, "Discarding unreadable persisted state");
                None
            }
        }
    }

    /// Save a store's durable state, logging and swallowing failures.
    ///
    /// Writes inline; stores go through [`WriteBehind`] instead.
    pub fn save<D: Serialize>(&self, name: &str, state: &D) {
        if let Some(encoded) = Self::encode(name, state) {
            self.write_encoded(name, &encoded);
        }
    }

    fn encode<D: Serialize>(name: &str, state: &D) -> Option<String> {
        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            state,
        };
        serde_json::to_string(&envelope)
            .inspect_err(|e| warn!(store = name, error = %e, "Failed to encode state for persistence"))
            .ok()
    }

    fn write_encoded(&self, name: &str, encoded: &str) {
        if let Err(e) = self.backend.write(&self.key(name), encoded) {
            warn!(store = name, error = %e, "Failed to persist state");
        }
    }

    /// Forget a store's persisted state.
    pub fn clear(&self, name: &str) {
        if let Err(e) = self.backend.remove(&self.key(name)) {
            warn!(store = name, error = %e, "Failed to clear persisted state");
        }
    }
}

// =============================================================================
// Write-behind
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Pending {
    generation: u64,
    encoded: Option<String>,
}

/// Save queue for one store.
///
/// Created inside a tokio runtime, it spawns a writer task that drains the
/// queue through `spawn_blocking`. Only the latest queued value is written,
/// so a burst of mutations costs one write. Created outside a runtime there
/// is no event loop to stall, and saves are written inline.
pub struct WriteBehind {
    name: &'static str,
    storage: PersistentStore,
    queue: Option<watch::Sender<Pending>>,
    written: Arc<watch::Sender<u64>>,
}

impl std::fmt::Debug for WriteBehind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBehind")
            .field("name", &self.name)
            .field("background", &self.queue.is_some())
            .finish_non_exhaustive()
    }
}

impl WriteBehind {
    /// Queue saves of store `name` into `storage`.
    #[must_use]
    pub fn new(name: &'static str, storage: PersistentStore) -> Self {
        let written = Arc::new(watch::Sender::new(0));
        let queue = Handle::try_current().ok().map(|runtime| {
            let (queue, pending) = watch::channel(Pending::default());
            runtime.spawn(drain(name, storage.clone(), pending, Arc::clone(&written)));
            queue
        });
        Self {
            name,
            storage,
            queue,
            written,
        }
    }

    /// Encode `state` now and queue it for writing.
    pub fn save<D: Serialize>(&self, state: &D) {
        let Some(encoded) = PersistentStore::encode(self.name, state) else {
            return;
        };
        match &self.queue {
            Some(queue) => queue.send_modify(|pending| {
                pending.generation += 1;
                pending.encoded = Some(encoded);
            }),
            None => self.storage.write_encoded(self.name, &encoded),
        }
    }

    /// Wait until everything queued so far has been written.
    pub async fn flush(&self) {
        let Some(queue) = &self.queue else {
            return;
        };
        let target = queue.borrow().generation;
        let mut written = self.written.subscribe();
        if written.wait_for(|generation| *generation >= target).await.is_err() {
            warn!(store = self.name, "Persistence writer stopped before flushing");
        }
    }
}

async fn drain(
    name: &'static str,
    storage: PersistentStore,
    mut pending: watch::Receiver<Pending>,
    written: Arc<watch::Sender<u64>>,
) {
    while pending.changed().await.is_ok() {
        let Pending {
            generation,
            encoded,
        } = pending.borrow_and_update().clone();

        if let Some(encoded) = encoded {
            let storage = storage.clone();
            let write = tokio::task::spawn_blocking(move || storage.write_encoded(name, &encoded));
            if let Err(e) = write.await {
                warn!(store = name, error = %e, "Persistence write task failed");
            }
        }
        written.send_replace(generation);
    }
    debug!(store = name, "Persistence writer stopped");
}

// =============================================================================
// Backends
// =============================================================================

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory.
///
/// Writes go to a temporary file that is renamed into place, so a crash
/// mid-write leaves the previous state intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Store files under `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the store files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| match e.kind() {
            std::io::ErrorKind::StorageFull => StorageError::QuotaExceeded(key.to_string()),
            std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::ReadOnlyFilesystem => {
                StorageError::Unavailable(e.to_string())
            }
            _ => StorageError::Io(e),
        })?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
