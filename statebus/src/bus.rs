//! The event-bus store: one state cell, many observers.
//!
//! An [`EventBusStore`] is a cheaply cloneable handle to a single shared
//! state cell plus an ordered listener list. Any code holding a handle can
//! read a snapshot, dispatch, or subscribe — no scope nesting required.
//! The cell is owned by the store; consumers never mutate it directly.
//!
//! Listener notification is synchronous and runs in subscription order.
//! The list is snapshotted before iterating, so a listener that subscribes
//! or unsubscribes during a publish affects the next publish, not the one
//! in flight. A panicking listener is not caught; it aborts the remaining
//! notifications for that publish.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

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

/// A change listener registered with [`EventBusStore::subscribe`].
pub type Listener<S> = Arc<dyn Fn(&S) + Send + Sync>;

/// Token identifying a subscription, for [`EventBusStore::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct BusInner<S> {
    state: S,
    reducer: Reducer<S>,
    listeners: Vec<(SubscriptionId, Listener<S>)>,
    next_listener: u64,
    pending_hydration: Option<S>,
    ready: bool,
}

/// State container observable from anywhere that holds a handle.
///
/// Cloning is cheap and shares the same cell; drop every handle and the
/// store is gone — there is no process-wide instance behind it.
///
/// # Example
///
/// ```
/// use statebus::{ActionRegistry, EventBusStore, StoreOptions};
///
/// let mut registry: ActionRegistry<i64> = ActionRegistry::new();
/// let add = registry.register("add", |count, data| count + data.as_i64().unwrap_or(0));
///
/// let store = EventBusStore::new(0, registry, StoreOptions::new()).unwrap();
/// let token = store.subscribe(|count| println!("count is now {count}"));
///
/// store.dispatch(add.invoke_with(2)).unwrap();
/// assert_eq!(store.state(), 2);
/// store.unsubscribe(token);
/// ```
pub struct EventBusStore<S> {
    inner: Arc<Mutex<BusInner<S>>>,
}

impl<S> Clone for EventBusStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> EventBusStore<S> {
    fn lock(&self) -> MutexGuard<'_, BusInner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a change listener; returns the token that detaches it.
    ///
    /// Listeners are kept in insertion order, without dedup — subscribing
    /// the same closure twice notifies it twice.
    pub fn subscribe(&self, listener: impl Fn(&S) + Send + Sync + 'static) -> SubscriptionId {
        let mut inner = self.lock();
        let id = SubscriptionId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    /// Detach a listener. Unknown or already-detached tokens are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().listeners.retain(|(token, _)| *token != id);
    }

    /// Number of currently attached listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

impl<S: Clone> EventBusStore<S> {
    /// Snapshot of the current state.
    pub fn state(&self) -> S {
        self.lock().state.clone()
    }

    /// Replace the held state and notify every listener, in subscription
    /// order.
    pub fn publish(&self, new_state: S) {
        let (state, listeners) = {
            let mut inner = self.lock();
            inner.state = new_state;
            (inner.state.clone(), inner.listeners.clone())
        };
        notify(&listeners, &state);
    }
}

impl<S> EventBusStore<S>
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
            inner: Arc::new(Mutex::new(BusInner {
                state,
                reducer,
                listeners: Vec::new(),
                next_listener: 0,
                pending_hydration: pending,
                ready: false,
            })),
        })
    }

    /// Run the reducer against the held state, store the result, and
    /// publish it.
    ///
    /// Reduction and the state replacement happen atomically; on any error
    /// the held state is unchanged and nothing is published.
    pub fn dispatch(&self, payload: Payload) -> StoreResult<()> {
        let (state, listeners) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            let next = inner.reducer.reduce(&inner.state, &payload)?;
            inner.state = next;
            (inner.state.clone(), inner.listeners.clone())
        };
        notify(&listeners, &state);
        Ok(())
    }

    /// Run an action set against this store.
    ///
    /// The snapshot handed to the body is taken here, when `execute` is
    /// called. It goes stale if other handles dispatch while the body is
    /// suspended — re-read [`state`](Self::state) from inside the body for
    /// a fresh value.
    pub fn execute<'a, R: 'a>(
        &'a self,
        invocation: ActionSetInvocation<S, R>,
    ) -> impl Future<Output = StoreResult<R>> + 'a
    where
        S: Send,
    {
        let snapshot = self.state();
        let mut dispatcher = self.clone();
        async move { run_action_set(&mut dispatcher, snapshot, invocation).await }
    }

    /// Apply the deferred persisted value and publish it, exactly once.
    ///
    /// The value travels through the ordinary dispatch path under the
    /// hydration sentinel, so listeners observe it like any other change.
    /// Second and later calls are no-ops, as is any call when construction
    /// found nothing to defer.
    pub fn signal_ready(&self) -> StoreResult<()> {
        let pending = {
            let mut inner = self.lock();
            if inner.ready {
                return Ok(());
            }
            inner.ready = true;
            inner.pending_hydration.take()
        };

        if let Some(stored) = pending {
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
    pub fn clear_persistence(&self) -> StoreResult<()> {
        self.lock().reducer.clear_persisted()
    }
}

impl<S> Dispatch<S> for EventBusStore<S>
where
    S: Clone + Serialize + DeserializeOwned + Send,
{
    fn dispatch(&mut self, payload: Payload) -> StoreResult<()> {
        EventBusStore::dispatch(self, payload)
    }
}

fn notify<S>(listeners: &[(SubscriptionId, Listener<S>)], state: &S) {
    for (_, listener) in listeners {
        listener(state);
    }
}

/// A consumer-held mirror of the published state.
///
/// Subscribes on construction and detaches when dropped — the same
/// attach-on-mount / detach-on-teardown lifecycle a UI consumer follows.
/// [`get`](Self::get) returns the latest state the mirror has seen, which
/// is updated on every publish.
pub struct StateMirror<S> {
    store: EventBusStore<S>,
    current: Arc<Mutex<S>>,
    token: SubscriptionId,
}

impl<S> StateMirror<S>
where
    S: Clone + Send + 'static,
{
    pub fn new(store: &EventBusStore<S>) -> Self {
        let current = Arc::new(Mutex::new(store.state()));
        let cell = Arc::clone(&current);
        let token = store.subscribe(move |state: &S| {
            *cell.lock().unwrap_or_else(PoisonError::into_inner) = state.clone();
        });
        Self {
            store: store.clone(),
            current,
            token,
        }
    }

    /// Latest published state seen by this mirror.
    pub fn get(&self) -> S {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<S> Drop for StateMirror<S> {
    fn drop(&mut self) {
        self.store.unsubscribe(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use crate::testing::RecordingListener;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct TestState {
        count: i64,
    }

    fn add(state: &TestState, data: &Value) -> TestState {
        TestState {
            count: state.count + data.as_i64().unwrap_or(0),
        }
    }

    fn new_registry() -> ActionRegistry<TestState> {
        let mut registry = ActionRegistry::new();
        registry.register("add", add);
        registry
    }

    fn new_store() -> EventBusStore<TestState> {
        EventBusStore::new(TestState::default(), new_registry(), StoreOptions::new())
            .expect("store")
    }

    #[test]
    fn test_dispatch_stores_and_publishes() {
        let store = new_store();
        let recorder: RecordingListener<TestState> = RecordingListener::new();
        store.subscribe(recorder.listener());

        store
            .dispatch(Payload::new("add", json!(4)))
            .expect("dispatch");

        assert_eq!(store.state().count, 4);
        assert_eq!(recorder.seen(), vec![TestState { count: 4 }]);
    }

    #[test]
    fn test_unknown_action_publishes_nothing() {
        let store = new_store();
        let recorder: RecordingListener<TestState> = RecordingListener::new();
        store.subscribe(recorder.listener());

        let result = store.dispatch(Payload::new("missing", Value::Null));
        assert!(matches!(result, Err(StoreError::UnknownAction(_))));
        assert_eq!(store.state().count, 0);
        assert!(recorder.seen().is_empty());
    }

    #[test]
    fn test_listeners_notified_in_subscription_order() {
        let store = new_store();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            store.subscribe(move |_: &TestState| {
                order.lock().expect("order lock").push(tag);
            });
        }

        store.publish(TestState { count: 1 });
        assert_eq!(
            *order.lock().expect("order lock"),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_unsubscribe_between_publishes() {
        let store = new_store();
        let a: RecordingListener<TestState> = RecordingListener::new();
        let b: RecordingListener<TestState> = RecordingListener::new();

        store.subscribe(a.listener());
        let token_b = store.subscribe(b.listener());

        store.publish(TestState { count: 1 });
        store.unsubscribe(token_b);
        store.publish(TestState { count: 2 });

        assert_eq!(a.count(), 2);
        assert_eq!(b.count(), 1);
    }

    #[test]
    fn test_listener_unsubscribing_mid_publish_still_sees_that_publish() {
        let store = new_store();
        let late: RecordingListener<TestState> = RecordingListener::new();

        // first listener removes the second one while a publish is running;
        // the snapshot policy keeps the second listener in the in-flight round
        let token_cell: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        {
            let store = store.clone();
            let token_cell = Arc::clone(&token_cell);
            store.clone().subscribe(move |_: &TestState| {
                if let Some(token) = *token_cell.lock().expect("token lock") {
                    store.unsubscribe(token);
                }
            });
        }
        let token = store.subscribe(late.listener());
        *token_cell.lock().expect("token lock") = Some(token);

        store.publish(TestState { count: 1 });
        assert_eq!(late.count(), 1);

        store.publish(TestState { count: 2 });
        assert_eq!(late.count(), 1);
    }

    #[test]
    fn test_handles_share_one_cell() {
        let store = new_store();
        let other = store.clone();

        other
            .dispatch(Payload::new("add", json!(6)))
            .expect("dispatch");
        assert_eq!(store.state().count, 6);
    }

    #[test]
    fn test_mirror_tracks_publishes_and_detaches_on_drop() {
        let store = new_store();
        let mirror = StateMirror::new(&store);
        assert_eq!(mirror.get().count, 0);

        store
            .dispatch(Payload::new("add", json!(5)))
            .expect("dispatch");
        assert_eq!(mirror.get().count, 5);

        assert_eq!(store.listener_count(), 1);
        drop(mirror);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_deferred_hydration_publishes_exactly_once() {
        let backend = MemoryBackend::new();
        {
            let mut seed = PersistenceSlot::new("counter", backend.clone());
            seed.write(&TestState { count: 40 }).expect("seed");
        }

        let store = EventBusStore::with_slot(
            TestState { count: 1 },
            new_registry(),
            Some(PersistenceSlot::new("counter", backend)),
            true,
        )
        .expect("store");
        assert_eq!(store.state().count, 1);

        let recorder: RecordingListener<TestState> = RecordingListener::new();
        store.subscribe(recorder.listener());

        store.signal_ready().expect("signal");
        store.signal_ready().expect("signal again");

        assert_eq!(store.state().count, 40);
        assert_eq!(recorder.seen(), vec![TestState { count: 40 }]);
    }
}
