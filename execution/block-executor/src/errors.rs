// Copyright © Aptos Foundation
// Parts of the project are originally copyright © Meta Platforms, Inc.
// SPDX-License-Identifier: Apache-2.0

use occ_types::{error::PanicError, state_store::StateViewError};
use thiserror::Error;

/// Unrecoverable errors of block execution. Handler failures, conflicts and livelock
/// are never reported this way.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BlockExecutionError {
    /// Reading from or writing to the backing store failed.
    #[error("Block execution failed to access the state: {0}")]
    StateViewError(#[from] StateViewError),
    /// unrecoverable BlockSTM error
    #[error("Fatal block executor error: {0}")]
    FatalBlockExecutorError(#[from] PanicError),
}

pub type BlockExecutionResult<T> = Result<T, BlockExecutionError>;
