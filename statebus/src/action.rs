//! Actions, payloads, and the action registry.
//!
//! An [`Action`] is a named pure state transition. Invoking it does not run
//! anything; it produces a [`Payload`] — the `(action_id, data)` pair that is
//! the only unit of information crossing the dispatch boundary. The
//! [`ActionRegistry`] maps human-readable names to actions and assigns each
//! action its id from the map key at registration time.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// A user-defined resolver: current state + payload data -> next state.
///
/// Resolvers are pure. They never mutate the state in place; they return a
/// replacement value, which the store commits wholesale.
pub type Resolver<S> = fn(&S, &Value) -> S;

/// The `(action_id, data)` pair produced by invoking an [`Action`].
///
/// Serializes as a two-element JSON array, keeping the wire-level pair shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload(String, Value);

impl Payload {
    /// Build a payload from a raw action id.
    ///
    /// Useful inside action set bodies, where action handles are not in
    /// scope; ids are the registry keys.
    pub fn new(action_id: impl Into<String>, data: Value) -> Self {
        Self(action_id.into(), data)
    }

    pub fn action_id(&self) -> &str {
        &self.0
    }

    pub fn data(&self) -> &Value {
        &self.1
    }

    pub fn into_parts(self) -> (String, Value) {
        (self.0, self.1)
    }
}

/// A named pure state-transition function plus its stable identifier.
///
/// Actions are created through [`ActionRegistry::register`], which assigns
/// the id from the registry key. The returned handle is cheap to clone and
/// exists so callers can build payloads:
///
/// ```
/// use statebus::ActionRegistry;
///
/// let mut registry: ActionRegistry<i64> = ActionRegistry::new();
/// let increment = registry.register("increment", |count, amount| {
///     count + amount.as_i64().unwrap_or(1)
/// });
///
/// let payload = increment.invoke_with(2);
/// assert_eq!(payload.action_id(), "increment");
/// ```
pub struct Action<S> {
    id: String,
    resolve: Resolver<S>,
}

impl<S> Action<S> {
    /// The identifier assigned at registration; equals the registry key.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Produce a payload with no data (`null`).
    pub fn invoke(&self) -> Payload {
        Payload(self.id.clone(), Value::Null)
    }

    /// Produce a payload carrying `data`.
    pub fn invoke_with(&self, data: impl Into<Value>) -> Payload {
        Payload(self.id.clone(), data.into())
    }

    /// Run the resolver against a state snapshot.
    pub(crate) fn apply(&self, state: &S, data: &Value) -> S {
        (self.resolve)(state, data)
    }
}

impl<S> Clone for Action<S> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            resolve: self.resolve,
        }
    }
}

impl<S> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("id", &self.id).finish()
    }
}

/// Mapping from action id to [`Action`].
///
/// Built up by `register` calls, then moved into a store at construction;
/// stores never mutate it afterwards. Registering the same name twice
/// replaces the earlier resolver (last registration wins) and logs a
/// warning.
pub struct ActionRegistry<S> {
    actions: HashMap<String, Action<S>>,
}

impl<S> ActionRegistry<S> {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register a resolver under `name` and return the action handle.
    ///
    /// The handle's id equals `name` for the lifetime of the registry.
    pub fn register(&mut self, name: impl Into<String>, resolve: Resolver<S>) -> Action<S> {
        let id = name.into();
        if self.actions.contains_key(&id) {
            warn!(action = %id, "action re-registered, replacing previous resolver");
        }
        let action = Action {
            id: id.clone(),
            resolve,
        };
        self.actions.insert(id, action.clone());
        action
    }

    /// Look up an action by id. `None` means the id was never registered.
    pub fn get(&self, id: &str) -> Option<&Action<S>> {
        self.actions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.actions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<S> Default for ActionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Clone for ActionRegistry<S> {
    fn clone(&self) -> Self {
        Self {
            actions: self.actions.clone(),
        }
    }
}

impl<S> fmt::Debug for ActionRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
