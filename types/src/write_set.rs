// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

//! For each transaction that executes successfully, the executor collects a `WriteSet` that
//! contains each key it updates. For each key, the transaction either gives its new value
//! or deletes it.

use crate::state_store::{StateKey, StateValue};
use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap};

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum WriteOp {
    Modification(StateValue),
    Deletion,
}

impl WriteOp {
    #[inline]
    pub fn is_deletion(&self) -> bool {
        match self {
            WriteOp::Deletion => true,
            WriteOp::Modification(_) => false,
        }
    }
}

pub trait TransactionWrite {
    /// Returns the value written, or None if the write is a deletion (tombstone).
    fn as_state_value(&self) -> Option<StateValue>;

    fn bytes_len(&self) -> usize;
}

impl TransactionWrite for WriteOp {
    fn as_state_value(&self) -> Option<StateValue> {
        match self {
            WriteOp::Modification(v) => Some(v.clone()),
            WriteOp::Deletion => None,
        }
    }

    fn bytes_len(&self) -> usize {
        match self {
            WriteOp::Modification(v) => v.size(),
            WriteOp::Deletion => 0,
        }
    }
}

/// `WriteSet` contains all keys that one transaction modifies, in key order.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct WriteSet {
    write_set: BTreeMap<StateKey, WriteOp>,
}

impl WriteSet {
    pub fn new(write_ops: impl IntoIterator<Item = (StateKey, WriteOp)>) -> Self {
        Self {
            write_set: write_ops.into_iter().collect(),
        }
    }

    pub fn insert(&mut self, key: StateKey, op: WriteOp) -> Option<WriteOp> {
        self.write_set.insert(key, op)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.write_set.is_empty()
    }

    pub fn len(&self) -> usize {
        self.write_set.len()
    }

    pub fn get(&self, key: &StateKey) -> Option<&WriteOp> {
        self.write_set.get(key)
    }

    #[inline]
    pub fn iter(&self) -> btree_map::Iter<'_, StateKey, WriteOp> {
        self.write_set.iter()
    }

    pub fn keys(&self) -> btree_map::Keys<'_, StateKey, WriteOp> {
        self.write_set.keys()
    }
}

impl FromIterator<(StateKey, WriteOp)> for WriteSet {
    fn from_iter<I: IntoIterator<Item = (StateKey, WriteOp)>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl<'a> IntoIterator for &'a WriteSet {
    type IntoIter = btree_map::Iter<'a, StateKey, WriteOp>;
    type Item = (&'a StateKey, &'a WriteOp);

    fn into_iter(self) -> Self::IntoIter {
        self.write_set.iter()
    }
}

impl IntoIterator for WriteSet {
    type IntoIter = btree_map::IntoIter<StateKey, WriteOp>;
    type Item = (StateKey, WriteOp);

    fn into_iter(self) -> Self::IntoIter {
        self.write_set.into_iter()
    }
}
