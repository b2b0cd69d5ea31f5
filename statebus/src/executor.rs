//! Action sets: asynchronous operations that dispatch ordinary actions.
//!
//! An [`ActionSet`] wraps an async body that may dispatch zero or more
//! actions before and after awaiting external work. The store's `execute`
//! hands the body three things: the dispatch entry point, a snapshot of
//! state taken when `execute` was called, and the caller-supplied input.
//!
//! Each `dispatch` made from inside the body runs the full reducer
//! synchronously at that point. The snapshot, however, is captured once at
//! call time: if other dispatches land while the body is suspended, the
//! snapshot goes stale. That is by contract — re-read the store when the
//! body needs fresh state.
//!
//! Failures inside the body propagate to the caller of `execute` unchanged;
//! there is no retry, no recovery, and no way to cancel a body once started.
//! Timeouts, if wanted, belong to the awaited work itself.
//!
//! # Example
//!
//! ```ignore
//! use futures::future::BoxFuture;
//! use serde_json::Value;
//! use statebus::{ActionSet, Dispatch, Payload, StoreResult};
//!
//! fn refill(
//!     dispatch: &mut dyn Dispatch<CounterState>,
//!     state: CounterState,
//!     input: Value,
//! ) -> BoxFuture<'_, StoreResult<i64>> {
//!     Box::pin(async move {
//!         dispatch.dispatch(Payload::new("begin_refill", Value::Null))?;
//!         let amount = fetch_refill_amount(&state, &input).await?;
//!         dispatch.dispatch(Payload::new("add", amount.into()))?;
//!         Ok(amount)
//!     })
//! }
//!
//! let refill_set = ActionSet::new(refill);
//! let added = store.execute(refill_set.invoke_with(3)).await?;
//! ```

use futures::future::BoxFuture;
use serde_json::Value;

use crate::action::Payload;
use crate::error::StoreResult;

/// Entry point for requesting a state mutation.
///
/// Implemented by both store variants, so an action set body can run
/// against either one.
pub trait Dispatch<S>: Send {
    /// Run the reducer against the current state and commit the result.
    fn dispatch(&mut self, payload: Payload) -> StoreResult<()>;
}

/// Signature of an action set body.
///
/// Receives the dispatch entry point, the call-time state snapshot, and the
/// invocation input.
pub type ExecuteFn<S, R> =
    for<'a> fn(&'a mut dyn Dispatch<S>, S, Value) -> BoxFuture<'a, StoreResult<R>>;

/// A factory pairing an async body with per-invocation input.
pub struct ActionSet<S, R> {
    execute: ExecuteFn<S, R>,
}

impl<S, R> ActionSet<S, R> {
    pub fn new(execute: ExecuteFn<S, R>) -> Self {
        Self { execute }
    }

    /// Produce an invocation with no input (`null`).
    pub fn invoke(&self) -> ActionSetInvocation<S, R> {
        ActionSetInvocation {
            execute: self.execute,
            input: Value::Null,
        }
    }

    /// Produce an invocation carrying `input`.
    pub fn invoke_with(&self, input: impl Into<Value>) -> ActionSetInvocation<S, R> {
        ActionSetInvocation {
            execute: self.execute,
            input: input.into(),
        }
    }
}

impl<S, R> Clone for ActionSet<S, R> {
    fn clone(&self) -> Self {
        Self {
            execute: self.execute,
        }
    }
}

/// The `(execute, input)` pair handed to a store's `execute`.
pub struct ActionSetInvocation<S, R> {
    pub(crate) execute: ExecuteFn<S, R>,
    pub(crate) input: Value,
}

/// Shared implementation behind both store variants' `execute`.
pub(crate) async fn run_action_set<S, R>(
    dispatcher: &mut dyn Dispatch<S>,
    snapshot: S,
    invocation: ActionSetInvocation<S, R>,
) -> StoreResult<R> {
    (invocation.execute)(dispatcher, snapshot, invocation.input).await
}
