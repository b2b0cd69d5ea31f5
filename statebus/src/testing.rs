//! Test utilities for statebus stores.
//!
//! # Example
//!
//! ```
//! use statebus::{ActionRegistry, EventBusStore, StoreOptions};
//! use statebus::testing::RecordingListener;
//!
//! let mut registry: ActionRegistry<i64> = ActionRegistry::new();
//! let bump = registry.register("bump", |count, _| count + 1);
//! let store = EventBusStore::new(0, registry, StoreOptions::new()).unwrap();
//!
//! let recorder = RecordingListener::new();
//! store.subscribe(recorder.listener());
//!
//! store.dispatch(bump.invoke()).unwrap();
//! assert_eq!(recorder.seen(), vec![1]);
//! ```

use std::sync::{Arc, Mutex, PoisonError};

/// Listener that records every published state it sees.
///
/// Clones share the same record, so a clone can be turned into the
/// subscribed closure while the original keeps access to the assertions.
pub struct RecordingListener<S> {
    seen: Arc<Mutex<Vec<S>>>,
}

impl<S> RecordingListener<S>
where
    S: Clone + Send + 'static,
{
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Closure suitable for `EventBusStore::subscribe`.
    pub fn listener(&self) -> impl Fn(&S) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |state: &S| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(state.clone());
        }
    }

    /// Every state published since the listener attached, oldest first.
    pub fn seen(&self) -> Vec<S> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of notifications received.
    pub fn count(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<S> Default for RecordingListener<S>
where
    S: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for RecordingListener<S> {
    fn clone(&self) -> Self {
        Self {
            seen: Arc::clone(&self.seen),
        }
    }
}
