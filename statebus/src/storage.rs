//! Key-value storage backends and the persistence slot.
//!
//! A store mirrors its state into a [`PersistenceSlot`]: a storage key plus
//! a backend. Two built-in backends cover the common cases — [`FileBackend`]
//! for state that survives restarts and the process-scoped session map — and
//! anything implementing [`StorageBackend`] can be substituted.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::{StorageKind, StoreOptions};
use crate::error::{StoreError, StoreResult};

/// Directory name for the durable backend's default root.
const DEFAULT_APP_DIR: &str = "statebus";

/// A key-value read/write/remove interface over string keys and values.
pub trait StorageBackend: Send {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> io::Result<()>;

    /// Remove the value stored under `key`. Removing a missing key is fine.
    fn remove(&mut self, key: &str) -> io::Result<()>;
}

/// In-memory backend; cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        self.entries().remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.entries().len())
            .finish()
    }
}

/// The process-scoped session backend.
///
/// Every store constructed with [`StorageKind::Session`] shares this one map;
/// it disappears when the process exits. The returned handle is an ordinary
/// [`MemoryBackend`] clone.
pub fn session_backend() -> MemoryBackend {
    static SESSION: OnceLock<MemoryBackend> = OnceLock::new();
    SESSION.get_or_init(MemoryBackend::new).clone()
}

/// File-per-key backend; one `<key>.json` file under a root directory.
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Backend rooted at `<platform data dir>/<app>`.
    pub fn new(app: &str) -> io::Result<Self> {
        let base = dirs::data_local_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "no local data directory available")
        })?;
        Ok(Self {
            root: base.join(app),
        })
    }

    /// Backend rooted at an explicit directory.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(key), value)
    }

    fn remove(&mut self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for FileBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBackend").field("root", &self.root).finish()
    }
}

/// The `(key, backend)` pair a store mirrors its state into.
pub struct PersistenceSlot {
    key: String,
    backend: Box<dyn StorageBackend>,
}

impl PersistenceSlot {
    /// Slot over a substituted backend.
    pub fn new(key: impl Into<String>, backend: impl StorageBackend + 'static) -> Self {
        Self {
            key: key.into(),
            backend: Box::new(backend),
        }
    }

    /// Resolve a slot from store options.
    ///
    /// Returns `None` when the key or the backend kind is missing — either
    /// absence disables persistence entirely.
    pub fn from_options(options: &StoreOptions) -> StoreResult<Option<Self>> {
        let (Some(key), Some(kind)) = (&options.storage_key, options.storage) else {
            return Ok(None);
        };
        let backend: Box<dyn StorageBackend> = match kind {
            StorageKind::Durable => Box::new(FileBackend::new(DEFAULT_APP_DIR)?),
            StorageKind::Session => Box::new(session_backend()),
        };
        Ok(Some(Self {
            key: key.clone(),
            backend,
        }))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read and deserialize the stored state, if any.
    ///
    /// A missing value is `Ok(None)`. A value that fails to deserialize is a
    /// hard [`StoreError::CorruptStorage`] — callers must not fall back to
    /// their initial state on corrupt data.
    pub fn read<S: DeserializeOwned>(&self) -> StoreResult<Option<S>> {
        let Some(raw) = self.backend.get(&self.key)? else {
            return Ok(None);
        };
        let state = serde_json::from_str(&raw).map_err(|source| StoreError::CorruptStorage {
            key: self.key.clone(),
            source,
        })?;
        Ok(Some(state))
    }

    /// Serialize `state` and write it under the slot's key.
    pub fn write<S: Serialize>(&mut self, state: &S) -> StoreResult<()> {
        let raw = serde_json::to_string(state).map_err(StoreError::SerializeState)?;
        self.backend.set(&self.key, &raw)?;
        debug!(key = %self.key, "persisted state");
        Ok(())
    }

    /// Remove the stored value.
    pub fn clear(&mut self) -> StoreResult<()> {
        self.backend.remove(&self.key)?;
        debug!(key = %self.key, "cleared persisted state");
        Ok(())
    }
}

impl fmt::Debug for PersistenceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceSlot").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestState {
        count: i64,
    }

    #[test]
    fn test_memory_backend_roundtrip() {
        let mut backend = MemoryBackend::new();
        assert_eq!(backend.get("k").expect("get"), None);

        backend.set("k", "v").expect("set");
        assert_eq!(backend.get("k").expect("get").as_deref(), Some("v"));

        backend.remove("k").expect("remove");
        assert_eq!(backend.get("k").expect("get"), None);
    }

    #[test]
    fn test_memory_backend_clones_share_entries() {
        let mut backend = MemoryBackend::new();
        let mirror = backend.clone();

        backend.set("k", "v").expect("set");
        assert_eq!(mirror.get("k").expect("get").as_deref(), Some("v"));
    }

    #[test]
    fn test_file_backend_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut backend = FileBackend::with_root(dir.path());

        assert_eq!(backend.get("state").expect("get"), None);
        backend.set("state", r#"{"count":3}"#).expect("set");
        assert_eq!(
            backend.get("state").expect("get").as_deref(),
            Some(r#"{"count":3}"#)
        );

        backend.remove("state").expect("remove");
        assert_eq!(backend.get("state").expect("get"), None);
        // removing again is still fine
        backend.remove("state").expect("remove");
    }

    #[test]
    fn test_slot_read_absent() {
        let slot = PersistenceSlot::new("missing", MemoryBackend::new());
        let stored: Option<TestState> = slot.read().expect("read");
        assert!(stored.is_none());
    }

    #[test]
    fn test_slot_write_then_read() {
        let backend = MemoryBackend::new();
        let mut slot = PersistenceSlot::new("state", backend.clone());

        slot.write(&TestState { count: 9 }).expect("write");

        let reread = PersistenceSlot::new("state", backend);
        let stored: Option<TestState> = reread.read().expect("read");
        assert_eq!(stored, Some(TestState { count: 9 }));
    }

    #[test]
    fn test_slot_corrupt_value_is_hard_error() {
        let mut backend = MemoryBackend::new();
        backend.set("state", "{not json").expect("set");

        let slot = PersistenceSlot::new("state", backend);
        let result: StoreResult<Option<TestState>> = slot.read();
        assert!(matches!(
            result,
            Err(StoreError::CorruptStorage { ref key, .. }) if key == "state"
        ));
    }

    #[test]
    fn test_from_options_requires_key_and_kind() {
        let none = PersistenceSlot::from_options(&StoreOptions::new()).expect("resolve");
        assert!(none.is_none());

        let key_only =
            PersistenceSlot::from_options(&StoreOptions::new().storage_key("k")).expect("resolve");
        assert!(key_only.is_none());

        let kind_only =
            PersistenceSlot::from_options(&StoreOptions::new().storage(StorageKind::Session))
                .expect("resolve");
        assert!(kind_only.is_none());

        let both = PersistenceSlot::from_options(
            &StoreOptions::new()
                .storage_key("k")
                .storage(StorageKind::Session),
        )
        .expect("resolve");
        assert!(both.is_some());
    }
}
