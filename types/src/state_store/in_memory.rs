// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::state_store::{
    prefix_range, StateKey, StateStore, StateValue, StateViewResult, TStateView,
};
use std::collections::BTreeMap;

/// Ordered in-memory backing store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemoryStateStore {
    state: BTreeMap<StateKey, StateValue>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    pub fn get(&self, state_key: &StateKey) -> Option<&StateValue> {
        self.state.get(state_key)
    }

    pub fn snapshot(&self) -> &BTreeMap<StateKey, StateValue> {
        &self.state
    }

    pub fn into_inner(self) -> BTreeMap<StateKey, StateValue> {
        self.state
    }
}

impl FromIterator<(StateKey, StateValue)> for InMemoryStateStore {
    fn from_iter<I: IntoIterator<Item = (StateKey, StateValue)>>(iter: I) -> Self {
        Self {
            state: iter.into_iter().collect(),
        }
    }
}

impl TStateView for InMemoryStateStore {
    fn get_state_value(&self, state_key: &StateKey) -> StateViewResult<Option<StateValue>> {
        Ok(self.state.get(state_key).cloned())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> StateViewResult<Vec<(StateKey, StateValue)>> {
        Ok(self
            .state
            .range(prefix_range(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

impl StateStore for InMemoryStateStore {
    fn set_state_value(&mut self, state_key: StateKey, value: StateValue) -> StateViewResult<()> {
        self.state.insert(state_key, value);
        Ok(())
    }

    fn remove_state_value(&mut self, state_key: &StateKey) -> StateViewResult<()> {
        self.state.remove(state_key);
        Ok(())
    }
}
