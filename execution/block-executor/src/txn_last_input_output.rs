// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{captured_reads::CapturedReads, task::ExecutionStatus};
use arc_swap::ArcSwapOption;
use crossbeam::utils::CachePadded;
use occ_mvhashmap::types::TxnIndex;
use occ_types::{
    error::{code_invariant_error, PanicError},
    write_set::WriteSet,
};
use std::sync::Arc;

/// Outcome of the last execution of a transaction, together with its buffered writes.
pub(crate) struct TxnOutput<O, E> {
    pub(crate) status: ExecutionStatus<O, E>,
    pub(crate) write_set: WriteSet,
}

pub(crate) struct TxnLastInputOutput<O, E> {
    inputs: Vec<CachePadded<ArcSwapOption<CapturedReads>>>, // txn_idx -> input.

    outputs: Vec<CachePadded<ArcSwapOption<TxnOutput<O, E>>>>, // txn_idx -> output.
}

impl<O, E> TxnLastInputOutput<O, E> {
    pub(crate) fn new(num_txns: TxnIndex) -> Self {
        Self {
            inputs: (0..num_txns)
                .map(|_| CachePadded::new(ArcSwapOption::empty()))
                .collect(),
            outputs: (0..num_txns)
                .map(|_| CachePadded::new(ArcSwapOption::empty()))
                .collect(),
        }
    }

    pub(crate) fn record(
        &self,
        txn_idx: TxnIndex,
        input: CapturedReads,
        status: ExecutionStatus<O, E>,
        write_set: WriteSet,
    ) {
        self.inputs[txn_idx as usize].store(Some(Arc::new(input)));
        self.outputs[txn_idx as usize].store(Some(Arc::new(TxnOutput { status, write_set })));
    }

    pub(crate) fn read_set(&self, txn_idx: TxnIndex) -> Option<Arc<CapturedReads>> {
        self.inputs[txn_idx as usize].load_full()
    }

    /// Whether the last recorded execution of the transaction reported failure.
    pub(crate) fn is_failure(&self, txn_idx: TxnIndex) -> bool {
        self.outputs[txn_idx as usize]
            .load()
            .as_ref()
            .map_or(false, |output| !output.status.is_success())
    }

    /// Moves the last recorded output out. Must be called once per transaction, after
    /// all executions have finished.
    pub(crate) fn take_output(&self, txn_idx: TxnIndex) -> Result<TxnOutput<O, E>, PanicError> {
        let output = self.outputs[txn_idx as usize].swap(None).ok_or_else(|| {
            code_invariant_error(format!(
                "[BlockSTM]: Execution output for txn {} must be recorded",
                txn_idx
            ))
        })?;

        Arc::try_unwrap(output).map_err(|_| {
            code_invariant_error(format!(
                "[BlockSTM]: Output of txn {} must not be shared when taken",
                txn_idx
            ))
        })
    }
}
