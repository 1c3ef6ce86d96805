// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Core types shared by the multi-version store and the block executor: keys and
//! values, write sets, and the backing store the executor snapshots and commits to.

pub mod error;
pub mod state_store;
pub mod write_set;
