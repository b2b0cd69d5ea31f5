//! Counter - minimal statebus example
//!
//! Demonstrates the core pattern end to end:
//! - State: what the app knows
//! - Actions: what can happen
//! - Store: where state lives, and who hears about changes
//! - Action set: async work that dispatches along the way
//!
//! The store persists to session storage, so state survives store
//! reconstruction within one process run. Switch to `StorageKind::Durable`
//! to keep it across runs.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use statebus::prelude::*;
use tracing::info;

// ============================================================================
// State - What the app knows
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CounterState {
    count: i64,
    flavor: String,
}

impl Default for CounterState {
    fn default() -> Self {
        Self {
            count: 0,
            flavor: "bar".to_string(),
        }
    }
}

// ============================================================================
// Actions - What can happen
// ============================================================================

fn increment(state: &CounterState, amount: &Value) -> CounterState {
    CounterState {
        count: state.count + amount.as_i64().unwrap_or(1),
        ..state.clone()
    }
}

fn toggle_flavor(state: &CounterState, _data: &Value) -> CounterState {
    CounterState {
        count: state.count,
        flavor: if state.flavor == "bar" {
            "baz".to_string()
        } else {
            "bar".to_string()
        },
    }
}

// ============================================================================
// Action set - Async work that dispatches ordinary actions
// ============================================================================

fn refill(
    dispatch: &mut dyn Dispatch<CounterState>,
    state: CounterState,
    input: Value,
) -> BoxFuture<'_, StoreResult<i64>> {
    Box::pin(async move {
        let amount = input.as_i64().unwrap_or(10);
        info!(current = state.count, amount, "refill requested");

        // stand-in for a network call
        tokio::time::sleep(Duration::from_millis(200)).await;

        dispatch.dispatch(Payload::new("increment", amount.into()))?;
        Ok(amount)
    })
}

// ============================================================================
// Main - Build the store, drive it, clean up
// ============================================================================

#[tokio::main]
async fn main() -> StoreResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut registry: ActionRegistry<CounterState> = ActionRegistry::new();
    let increment = registry.register("increment", increment);
    let toggle = registry.register("toggle_flavor", toggle_flavor);

    let options = StoreOptions::new()
        .storage_key("counter_demo")
        .storage(StorageKind::Session);
    let store = EventBusStore::new(CounterState::default(), registry, options)?;

    store.subscribe(|state: &CounterState| {
        println!("  -> count={} flavor={}", state.count, state.flavor);
    });
    let mirror = StateMirror::new(&store);

    println!("dispatch increment(2):");
    store.dispatch(increment.invoke_with(2))?;

    println!("dispatch toggle_flavor:");
    store.dispatch(toggle.invoke())?;

    println!("execute refill(40):");
    let refill_set = ActionSet::new(refill);
    let added = store.execute(refill_set.invoke_with(40)).await?;
    println!("refill added {added}");

    println!("mirror sees: {:?}", mirror.get());

    // a second store over the same slot picks the state back up
    let reborn = EventBusStore::new(
        CounterState::default(),
        store_registry(),
        StoreOptions::new()
            .storage_key("counter_demo")
            .storage(StorageKind::Session),
    )?;
    println!("rehydrated store sees: {:?}", reborn.state());

    store.clear_persistence()?;
    Ok(())
}

fn store_registry() -> ActionRegistry<CounterState> {
    let mut registry = ActionRegistry::new();
    registry.register("increment", increment);
    registry.register("toggle_flavor", toggle_flavor);
    registry
}
