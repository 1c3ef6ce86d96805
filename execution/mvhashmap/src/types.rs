// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

pub type TxnIndex = u32;
pub type Incarnation = u32;
pub type Version = (TxnIndex, Incarnation);

/// Kind of a transaction-authored entry in a version cell. Tombstones are not a flag:
/// they are entries whose value is a deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Published by an execution that reported success, not yet committed.
    Estimate,
    /// Published by an execution that reported failure. Visible to readers until the
    /// failure is settled, but a read resolving to it never validates.
    FailedEstimate,
    /// Written by a transaction during the ordered commit pass.
    Committed,
}

/// The version a read resolved to: either the pre-block (storage) value, or the entry
/// written by a given incarnation of a lower transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObservedVersion {
    Storage,
    Versioned(Version),
}

impl ObservedVersion {
    /// Index of the transaction that authored the observed value, if any.
    pub fn author(&self) -> Option<TxnIndex> {
        match self {
            ObservedVersion::Storage => None,
            ObservedVersion::Versioned((idx, _)) => Some(*idx),
        }
    }
}

/// Returned as Err(..) when failed to read from the multi-version data-structure.
#[derive(Debug, PartialEq, Eq)]
pub enum MVDataError {
    /// No prior entry is found, and the storage value was not yet cached.
    NotFound,
}

/// Returned as Ok(..) when read successfully from the multi-version data-structure.
#[derive(Debug, PartialEq, Eq)]
pub enum MVDataOutput<V> {
    /// The pre-block value, cached in the cell.
    Storage(Arc<V>),
    /// Information from the last versioned-write below the reader.
    Versioned(Version, Flag, Arc<V>),
}

impl<V> MVDataOutput<V> {
    pub fn observed_version(&self) -> ObservedVersion {
        match self {
            MVDataOutput::Storage(_) => ObservedVersion::Storage,
            MVDataOutput::Versioned(version, _, _) => ObservedVersion::Versioned(*version),
        }
    }

    pub fn value(&self) -> &Arc<V> {
        match self {
            MVDataOutput::Storage(v) | MVDataOutput::Versioned(_, _, v) => v,
        }
    }

    pub fn is_failed_estimate(&self) -> bool {
        matches!(self, MVDataOutput::Versioned(_, Flag::FailedEstimate, _))
    }
}

// In order to store base values at the lowest index, i.e. at index 0, without conflicting
// with actual transaction index 0, the following struct wraps the index and internally
// increments it by 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ShiftedTxnIndex {
    idx: TxnIndex,
}

impl ShiftedTxnIndex {
    pub(crate) fn new(real_idx: TxnIndex) -> Self {
        Self { idx: real_idx + 1 }
    }

    pub(crate) fn idx(&self) -> Option<TxnIndex> {
        (self.idx > 0).then(|| self.idx - 1)
    }

    pub(crate) fn zero_idx() -> Self {
        Self { idx: 0 }
    }
}
