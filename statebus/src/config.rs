//! Store construction options.

/// Which built-in storage backend a store persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Survives process restarts; backed by files in the platform data
    /// directory.
    Durable,
    /// Lives for the current process only; shared by every store that
    /// selects it.
    Session,
}

/// Options supplied once at store construction, never mutated after.
///
/// Persistence is enabled only when **both** `storage_key` and `storage`
/// are set; the absence of either disables it entirely.
///
/// # Example
/// ```
/// use statebus::{StorageKind, StoreOptions};
///
/// let options = StoreOptions::new()
///     .storage_key("my_store")
///     .storage(StorageKind::Session)
///     .defer_hydration(true);
/// assert!(options.defer_hydration);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Key the serialized state is stored under.
    pub storage_key: Option<String>,
    /// Which built-in backend to store it in.
    pub storage: Option<StorageKind>,
    /// Ignore any persisted value at construction; apply it later via
    /// `signal_ready`.
    pub defer_hydration: bool,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage key.
    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = Some(key.into());
        self
    }

    /// Select a built-in storage backend.
    pub fn storage(mut self, kind: StorageKind) -> Self {
        self.storage = Some(kind);
        self
    }

    /// Defer applying a persisted value until `signal_ready` is called.
    pub fn defer_hydration(mut self, defer: bool) -> Self {
        self.defer_hydration = defer;
        self
    }
}
