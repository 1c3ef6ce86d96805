// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! The backing sequential store. Block execution reads a read-only snapshot of it
//! through [`TStateView`] and writes the finalized block outcome back through
//! [`StateStore`] in transaction order.

use crate::write_set::{TransactionWrite, WriteSet};
use std::ops::Deref;

pub mod errors;
pub mod in_memory;
pub mod state_key;
pub mod state_value;

pub use errors::{StateViewError, StateViewResult};
pub use in_memory::InMemoryStateStore;
pub use state_key::{prefix_range, StateKey};
pub use state_value::StateValue;

/// `TStateView` is a read-only snapshot of the global state. It is passed to block
/// execution, during which it is guaranteed not to change.
pub trait TStateView: Sync {
    /// Gets the state value for a given state key.
    fn get_state_value(&self, state_key: &StateKey) -> StateViewResult<Option<StateValue>>;

    /// Returns all entries whose key starts with `prefix`, in key order.
    fn iter_prefix(&self, prefix: &[u8]) -> StateViewResult<Vec<(StateKey, StateValue)>>;
}

impl<R, S> TStateView for R
where
    R: Deref<Target = S> + Sync,
    S: TStateView,
{
    fn get_state_value(&self, state_key: &StateKey) -> StateViewResult<Option<StateValue>> {
        self.deref().get_state_value(state_key)
    }

    fn iter_prefix(&self, prefix: &[u8]) -> StateViewResult<Vec<(StateKey, StateValue)>> {
        self.deref().iter_prefix(prefix)
    }
}

/// Write side of the backing store, used only by the (single-threaded) commit pass.
pub trait StateStore: TStateView {
    fn set_state_value(&mut self, state_key: StateKey, value: StateValue) -> StateViewResult<()>;

    fn remove_state_value(&mut self, state_key: &StateKey) -> StateViewResult<()>;

    /// Applies the write set in key order. Not atomic: on error, the writes applied
    /// before the failing one are kept.
    fn apply_write_set(&mut self, write_set: WriteSet) -> StateViewResult<()> {
        for (key, op) in write_set {
            match op.as_state_value() {
                Some(value) => self.set_state_value(key, value)?,
                None => self.remove_state_value(&key)?,
            }
        }
        Ok(())
    }
}
