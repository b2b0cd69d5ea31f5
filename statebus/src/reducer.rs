//! The dispatch path: registry lookup, resolve, persist.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::action::{ActionRegistry, Payload};
use crate::error::{StoreError, StoreResult};
use crate::storage::PersistenceSlot;

/// Action id reserved for the hydration handshake.
///
/// A payload carrying this id bypasses the registry and replaces the state
/// wholesale with the payload data. It is produced internally by
/// `signal_ready`; ordinary callers have no reason to dispatch it.
pub const CLIENT_READY_ACTION: &str = "__client_ready__";

/// Combines a state snapshot and a payload into the next state, mirroring
/// the result into the persistence slot when one is configured.
///
/// Stores own exactly one reducer; the registry inside it is read-only for
/// the reducer's lifetime.
pub struct Reducer<S> {
    registry: ActionRegistry<S>,
    slot: Option<PersistenceSlot>,
}

impl<S> Reducer<S> {
    pub fn new(registry: ActionRegistry<S>, slot: Option<PersistenceSlot>) -> Self {
        Self { registry, slot }
    }

    pub fn registry(&self) -> &ActionRegistry<S> {
        &self.registry
    }

    /// Remove the persisted value, or fail when no slot is configured.
    ///
    /// Calling this without storage configured is a caller bug, not a
    /// harmless no-op.
    pub(crate) fn clear_persisted(&mut self) -> StoreResult<()> {
        match &mut self.slot {
            Some(slot) => slot.clear(),
            None => Err(StoreError::NoStorageConfigured),
        }
    }
}

impl<S> Reducer<S>
where
    S: Serialize + DeserializeOwned,
{
    /// Apply `payload` to `state`, producing the next state.
    ///
    /// The next state is written to the slot **before** it is returned, so
    /// any failure — unknown action, serialization, backend — reaches the
    /// caller while its held state is still the previous one.
    pub fn reduce(&mut self, state: &S, payload: &Payload) -> StoreResult<S> {
        if payload.action_id() == CLIENT_READY_ACTION {
            trace!("applying hydration payload");
            return serde_json::from_value(payload.data().clone())
                .map_err(StoreError::InvalidHydration);
        }

        let action = self
            .registry
            .get(payload.action_id())
            .ok_or_else(|| StoreError::UnknownAction(payload.action_id().to_string()))?;

        let next = action.apply(state, payload.data());
        debug!(action = %payload.action_id(), "action resolved");

        if let Some(slot) = &mut self.slot {
            slot.write(&next)?;
        }

        Ok(next)
    }

    /// Read the persisted state, if a slot is configured and holds one.
    pub(crate) fn read_persisted(&self) -> StoreResult<Option<S>> {
        match &self.slot {
            Some(slot) => slot.read(),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageBackend};
    use serde::Deserialize;
    use serde_json::{json, Value};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct TestState {
        count: i64,
    }

    fn add(state: &TestState, data: &Value) -> TestState {
        TestState {
            count: state.count + data.as_i64().unwrap_or(0),
        }
    }

    fn registry() -> (ActionRegistry<TestState>, crate::action::Action<TestState>) {
        let mut registry = ActionRegistry::new();
        let add = registry.register("add", add);
        (registry, add)
    }

    #[test]
    fn test_reduce_applies_resolver() {
        let (registry, add) = registry();
        let mut reducer = Reducer::new(registry, None);

        let next = reducer
            .reduce(&TestState { count: 1 }, &add.invoke_with(4))
            .expect("reduce");
        assert_eq!(next.count, 5);
    }

    #[test]
    fn test_unknown_action_is_hard_failure() {
        let (registry, _) = registry();
        let mut reducer = Reducer::new(registry, None);

        let result = reducer.reduce(&TestState::default(), &Payload::new("nope", Value::Null));
        assert!(matches!(result, Err(StoreError::UnknownAction(ref id)) if id == "nope"));
    }

    #[test]
    fn test_reduce_writes_through_to_slot() {
        let backend = MemoryBackend::new();
        let (registry, add) = registry();
        let slot = PersistenceSlot::new("state", backend.clone());
        let mut reducer = Reducer::new(registry, Some(slot));

        reducer
            .reduce(&TestState { count: 2 }, &add.invoke_with(3))
            .expect("reduce");

        assert_eq!(
            backend.get("state").expect("get").as_deref(),
            Some(r#"{"count":5}"#)
        );
    }

    #[test]
    fn test_hydration_sentinel_bypasses_registry() {
        // empty registry on purpose: the sentinel must not hit it
        let mut reducer: Reducer<TestState> = Reducer::new(ActionRegistry::new(), None);

        let next = reducer
            .reduce(
                &TestState::default(),
                &Payload::new(CLIENT_READY_ACTION, json!({"count": 11})),
            )
            .expect("reduce");
        assert_eq!(next.count, 11);
    }

    #[test]
    fn test_hydration_sentinel_does_not_persist() {
        let backend = MemoryBackend::new();
        let slot = PersistenceSlot::new("state", backend.clone());
        let mut reducer: Reducer<TestState> = Reducer::new(ActionRegistry::new(), Some(slot));

        reducer
            .reduce(
                &TestState::default(),
                &Payload::new(CLIENT_READY_ACTION, json!({"count": 11})),
            )
            .expect("reduce");

        assert_eq!(backend.get("state").expect("get"), None);
    }

    #[test]
    fn test_bad_hydration_payload_is_rejected() {
        let mut reducer: Reducer<TestState> = Reducer::new(ActionRegistry::new(), None);

        let result = reducer.reduce(
            &TestState::default(),
            &Payload::new(CLIENT_READY_ACTION, json!("not a state")),
        );
        assert!(matches!(result, Err(StoreError::InvalidHydration(_))));
    }

    #[test]
    fn test_clear_without_slot_fails() {
        let mut reducer: Reducer<TestState> = Reducer::new(ActionRegistry::new(), None);
        assert!(matches!(
            reducer.clear_persisted(),
            Err(StoreError::NoStorageConfigured)
        ));
    }
}
