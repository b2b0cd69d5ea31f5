//! The scoped store: one owner, explicit passing.
//!
//! Where the event-bus variant is observable from anywhere that holds a
//! handle, a [`ScopedStore`] is a plain owned value: the code that
//! constructs it decides which subtree of the program sees it, by passing
//! a reference down. Consumers read snapshots and request mutation through
//! `dispatch`; nothing else touches the state cell.
//!
//! Each construction is fully independent — two scoped stores never share
//! state, even when built from the same registry and options.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::action::{ActionRegistry, Payload};
use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::executor::{run_action_set, ActionSetInvocation, Dispatch};
use crate::reducer::{Reducer, CLIENT_READY_ACTION};
use crate::storage::PersistenceSlot;

/// State container bound to a single owner.
///
/// # Example
///
/// ```
/// use serde_json::Value;
/// use statebus::{ActionRegistry, ScopedStore, StoreOptions};
///
/// let mut registry: ActionRegistry<i64> = ActionRegistry::new();
/// let add = registry.register("add", |count, data| count + data.as_i64().unwrap_or(0));
///
/// let mut store = ScopedStore::new(0, registry, StoreOptions::new()).unwrap();
/// store.dispatch(add.invoke_with(5)).unwrap();
/// assert_eq!(*store.state(), 5);
/// ```
pub struct ScopedStore<S> {
    state: S,
    reducer: Reducer<S>,
    pending_hydration: Option<S>,
    ready: bool,
}

impl<S> ScopedStore<S>
where
    S: Clone + Serialize + DeserializeOwned,
{
    /// Build a store from options.
    ///
    /// The persistence slot is read exactly once, here. A stored value
    /// overrides `initial` unless hydration is deferred, in which case it
    /// is parked until [`signal_ready`](Self::signal_ready).
    pub fn new(initial: S, registry: ActionRegistry<S>, options: StoreOptions) -> StoreResult<Self> {
        let slot = PersistenceSlot::from_options(&options)?;
        Self::with_slot(initial, registry, slot, options.defer_hydration)
    }

    /// Build a store over an explicit slot (or none), e.g. a substituted
    /// backend.
    pub fn with_slot(
        initial: S,
        registry: ActionRegistry<S>,
        slot: Option<PersistenceSlot>,
        defer_hydration: bool,
    ) -> StoreResult<Self> {
        let reducer = Reducer::new(registry, slot);
        let persisted = reducer.read_persisted()?;

        let (state, pending) = match (persisted, defer_hydration) {
            (Some(stored), false) => (stored, None),
            (Some(stored), true) => (initial, Some(stored)),
            (None, _) => (initial, None),
        };

        Ok(Self {
            state,
            reducer,
            pending_hydration: pending,
            ready: false,
        })
    }

    /// Read-only snapshot of the current state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Registered actions backing this store.
    pub fn registry(&self) -> &ActionRegistry<S> {
        self.reducer.registry()
    }

    /// Run the reducer and commit the result.
    ///
    /// On any error the held state is unchanged.
    pub fn dispatch(&mut self, payload: Payload) -> StoreResult<()> {
        let next = self.reducer.reduce(&self.state, &payload)?;
        self.state = next;
        Ok(())
    }

    /// Run an action set against this store.
    ///
    /// The snapshot handed to the body is taken here, when `execute` is
    /// called — not when the returned future is first polled, and not when
    /// any inner dispatch resolves.
    pub fn execute<'a, R: 'a>(
        &'a mut self,
        invocation: ActionSetInvocation<S, R>,
    ) -> impl Future<Output = StoreResult<R>> + 'a
    where
        S: Send,
    {
        let snapshot = self.state.clone();
        async move { run_action_set(self, snapshot, invocation).await }
    }

    /// Apply a deferred persisted value, once.
    ///
    /// The value travels through the ordinary dispatch path under the
    /// hydration sentinel. Second and later calls are no-ops, as is any
    /// call when construction found nothing to defer.
    pub fn signal_ready(&mut self) -> StoreResult<()> {
        if self.ready {
            return Ok(());
        }
        self.ready = true;

        if let Some(stored) = self.pending_hydration.take() {
            let data: Value = serde_json::to_value(&stored).map_err(StoreError::SerializeState)?;
            self.dispatch(Payload::new(CLIENT_READY_ACTION, data))?;
            debug!("deferred hydration applied");
        }
        Ok(())
    }

    /// Remove the persisted value for this store's slot.
    ///
    /// Fails with [`StoreError::NoStorageConfigured`] when the store was
    /// built without one.
    pub fn clear_persistence(&mut self) -> StoreResult<()> {
        self.reducer.clear_persisted()
    }
}

impl<S> Dispatch<S> for ScopedStore<S>
where
    S: Clone + Serialize + DeserializeOwned + Send,
{
    fn dispatch(&mut self, payload: Payload) -> StoreResult<()> {
        ScopedStore::dispatch(self, payload)
    }
}
