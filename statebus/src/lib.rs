//! statebus: action/reducer state containers for UI-style applications
//!
//! State lives in a container, changes happen through dispatched actions,
//! and every change can be mirrored into key-value storage. Two delivery
//! mechanisms share one reducer and persistence layer:
//!
//! - [`ScopedStore`]: an owned container passed explicitly down the call
//!   graph; each construction is an independent scope.
//! - [`EventBusStore`]: a cloneable handle to one shared cell, observable
//!   from anywhere via subscribe/unsubscribe.
//!
//! # Core Concepts
//!
//! - **Action**: named pure state transition; invoking it yields a payload
//! - **Payload**: the `(action_id, data)` pair crossing the dispatch boundary
//! - **Reducer**: registry lookup + resolve + persistence write-through
//! - **Persistence slot**: optional `(key, backend)` pair the state mirrors to
//! - **Action set**: async operation dispatching actions around awaited work
//!
//! # Basic Example
//!
//! ```
//! use statebus::{ActionRegistry, EventBusStore, StorageKind, StoreOptions};
//!
//! #[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! let mut registry: ActionRegistry<CounterState> = ActionRegistry::new();
//! let increment = registry.register("increment", |state, amount| CounterState {
//!     count: state.count + amount.as_i64().unwrap_or(1),
//! });
//!
//! let options = StoreOptions::new()
//!     .storage_key("counter")
//!     .storage(StorageKind::Session);
//! let store = EventBusStore::new(CounterState::default(), registry, options).unwrap();
//!
//! let token = store.subscribe(|state: &CounterState| {
//!     // re-render, log, mirror - whatever the consumer needs
//!     let _ = state;
//! });
//!
//! store.dispatch(increment.invoke_with(2)).unwrap();
//! assert_eq!(store.state().count, 2);
//! store.unsubscribe(token);
//! # store.clear_persistence().unwrap();
//! ```
//!
//! # Persistence and deferred hydration
//!
//! A store built with both a storage key and a backend kind writes every
//! reducer result through to storage and reads it back once at the next
//! construction. When the first rendered frame must match a server-produced
//! snapshot, construct with `defer_hydration(true)`: the persisted value is
//! parked, and a later `signal_ready()` applies and publishes it exactly
//! once, after the client has taken over.
//!
//! # Async work
//!
//! Long-running operations are [`ActionSet`]s: async bodies receiving the
//! dispatch entry point and a call-time state snapshot. See the
//! [`executor`] module docs for the pattern and its staleness caveat.

pub mod action;
pub mod bus;
pub mod config;
pub mod error;
pub mod executor;
pub mod reducer;
pub mod scoped;
pub mod storage;
pub mod testing;

// Action exports
pub use action::{Action, ActionRegistry, Payload, Resolver};

// Store exports
pub use bus::{EventBusStore, Listener, StateMirror, SubscriptionId};
pub use scoped::ScopedStore;

// Reducer exports
pub use reducer::{Reducer, CLIENT_READY_ACTION};

// Executor exports
pub use executor::{ActionSet, ActionSetInvocation, Dispatch, ExecuteFn};

// Storage exports
pub use storage::{
    session_backend, FileBackend, MemoryBackend, PersistenceSlot, StorageBackend,
};

// Config and error exports
pub use config::{StorageKind, StoreOptions};
pub use error::{StoreError, StoreResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, ActionRegistry, Payload, Resolver};
    pub use crate::bus::{EventBusStore, Listener, StateMirror, SubscriptionId};
    pub use crate::config::{StorageKind, StoreOptions};
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::executor::{ActionSet, ActionSetInvocation, Dispatch, ExecuteFn};
    pub use crate::reducer::{Reducer, CLIENT_READY_ACTION};
    pub use crate::scoped::ScopedStore;
    pub use crate::storage::{
        session_backend, FileBackend, MemoryBackend, PersistenceSlot, StorageBackend,
    };
}
