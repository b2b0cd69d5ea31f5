//! Store error types.

use thiserror::Error;

/// Errors surfaced by stores, reducers, and storage.
///
/// There is no local recovery anywhere in this crate: every variant is a
/// hard stop handed back to the caller, and a failed dispatch leaves the
/// previously-held state unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A payload referenced an action id that is not in the registry.
    #[error("no action registered with id '{0}'")]
    UnknownAction(String),

    /// A persisted value exists but cannot be deserialized into the state
    /// type. Never treated as "nothing stored".
    #[error("stored state under key '{key}' could not be deserialized")]
    CorruptStorage {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// `clear_persistence` was called on a store without a configured slot.
    #[error("storage is not configured for this store")]
    NoStorageConfigured,

    /// The state could not be serialized for a persistence write.
    #[error("failed to serialize state for persistence")]
    SerializeState(#[source] serde_json::Error),

    /// A hydration payload did not deserialize into the state type.
    #[error("hydration payload could not be deserialized")]
    InvalidHydration(#[source] serde_json::Error),

    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(#[from] std::io::Error),

    /// An action set body failed.
    #[error("action set execution failed: {0}")]
    Execution(String),
}

impl StoreError {
    /// Wrap an external failure from inside an action set body.
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
