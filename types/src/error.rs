// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;
use tracing::error;

/// Raised when an internal invariant of the execution engine does not hold. These are
/// programming errors: they must never be caused by the content of a transaction.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PanicError {
    #[error("Code invariant error: {0}")]
    CodeInvariantError(String),
}

impl PanicError {
    pub fn message(&self) -> &str {
        match self {
            PanicError::CodeInvariantError(msg) => msg,
        }
    }
}

// Wrapping the constructor allows to log every invariant violation at the place it is
// detected, even if the caller later decides to recover.
pub fn code_invariant_error<M: std::fmt::Debug>(message: M) -> PanicError {
    let msg = format!("{:?}", message);
    error!("Code invariant broken: {}", msg);
    PanicError::CodeInvariantError(msg)
}
