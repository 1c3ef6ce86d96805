// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::types::{MVDataError, MVDataOutput, ObservedVersion, Version};
use claims::{assert_err_eq, assert_none, assert_ok, assert_some_eq};
use occ_types::{
    state_store::{prefix_range, StateKey, StateValue},
    write_set::WriteOp,
};
use std::sync::Arc;

mod proptest_types;

// Generate a value deterministically based on txn_idx and incarnation.
fn value_for(txn_idx: TxnIndex, incarnation: Incarnation) -> WriteOp {
    WriteOp::Modification(StateValue::from(
        (txn_idx as u64) * 1000 + incarnation as u64,
    ))
}

fn key(k: &str) -> StateKey {
    StateKey::from(k)
}

#[test]
fn create_write_read_versioned() {
    let ap1 = key("/foo/b");
    let ap2 = key("/foo/c");

    let mvtbl: MVHashMap<StateKey, WriteOp> = MVHashMap::new(20);

    // Reads that should go to storage return Err(NotFound).
    assert_err_eq!(mvtbl.data().fetch_data(&ap1, 5), MVDataError::NotFound);

    // Write by txn 10.
    mvtbl.write_estimates(10, 1, vec![(ap1.clone(), value_for(10, 1))], true);

    // Reads at or below txn 10 don't observe it.
    assert_err_eq!(mvtbl.data().fetch_data(&ap1, 9), MVDataError::NotFound);
    assert_err_eq!(mvtbl.data().fetch_data(&ap1, 10), MVDataError::NotFound);

    // Reads for a higher txn return the entry written by txn 10.
    assert_ok_versioned(&mvtbl, &ap1, 15, (10, 1), Flag::Estimate, value_for(10, 1));

    // More writes.
    mvtbl.write_estimates(12, 0, vec![(ap1.clone(), value_for(12, 0))], true);
    mvtbl.write_estimates(8, 3, vec![(ap1.clone(), value_for(8, 3))], true);

    assert_ok_versioned(&mvtbl, &ap1, 15, (12, 0), Flag::Estimate, value_for(12, 0));
    assert_ok_versioned(&mvtbl, &ap1, 11, (10, 1), Flag::Estimate, value_for(10, 1));
    assert_ok_versioned(&mvtbl, &ap1, 10, (8, 3), Flag::Estimate, value_for(8, 3));

    // Invalidate txn 10: readers fall through to txn 8.
    assert_eq!(mvtbl.invalidate(10), vec![ap1.clone()]);
    assert_ok_versioned(&mvtbl, &ap1, 11, (8, 3), Flag::Estimate, value_for(8, 3));
    // Invalidating twice is harmless.
    assert!(mvtbl.invalidate(10).is_empty());

    // A re-execution of txn 8 that only writes ap2 drops the stale entry at ap1.
    mvtbl.write_estimates(8, 4, vec![(ap2.clone(), value_for(8, 4))], true);
    assert_err_eq!(mvtbl.data().fetch_data(&ap1, 11), MVDataError::NotFound);
    assert_ok_versioned(&mvtbl, &ap2, 9, (8, 4), Flag::Estimate, value_for(8, 4));
    assert_eq!(mvtbl.written_keys(8), vec![ap2]);
}

fn assert_ok_versioned(
    mvtbl: &MVHashMap<StateKey, WriteOp>,
    k: &StateKey,
    reader: TxnIndex,
    version: Version,
    flag: Flag,
    value: WriteOp,
) {
    assert_eq!(
        mvtbl.data().fetch_data(k, reader),
        Ok(MVDataOutput::Versioned(version, flag, Arc::new(value)))
    );
}

#[test]
fn base_value_below_every_transaction() {
    let ap = key("a");
    let mvtbl: MVHashMap<StateKey, WriteOp> = MVHashMap::new(4);

    mvtbl.data().set_base_value(ap.clone(), value_for(0, 7));
    // The first cached storage value is kept.
    mvtbl.data().set_base_value(ap.clone(), value_for(0, 8));

    let output = assert_ok!(mvtbl.data().fetch_data(&ap, 0));
    assert_eq!(output.observed_version(), ObservedVersion::Storage);
    assert_eq!(output.value().as_ref(), &value_for(0, 7));

    mvtbl.write_estimates(1, 0, vec![(ap.clone(), WriteOp::Deletion)], true);
    // Tombstones are regular entries.
    assert_ok_versioned(&mvtbl, &ap, 2, (1, 0), Flag::Estimate, WriteOp::Deletion);
    let output = assert_ok!(mvtbl.data().fetch_data(&ap, 1));
    assert_eq!(output.observed_version(), ObservedVersion::Storage);
}

#[test]
fn failed_estimates_are_tagged() {
    let ap = key("k");
    let mvtbl: MVHashMap<StateKey, WriteOp> = MVHashMap::new(3);

    mvtbl.write_estimates(0, 0, vec![(ap.clone(), value_for(0, 0))], false);
    let output = assert_ok!(mvtbl.data().fetch_data(&ap, 1));
    assert!(output.is_failed_estimate());
    assert_eq!(output.observed_version().author(), Some(0));

    // Committing a failed estimate is a protocol violation.
    assert!(mvtbl.mark_committed(0).is_err());

    // Re-execution that succeeds replaces the tag.
    mvtbl.write_estimates(0, 1, vec![(ap.clone(), value_for(0, 1))], true);
    assert!(!assert_ok!(mvtbl.data().fetch_data(&ap, 1)).is_failed_estimate());
}

#[test]
fn mark_committed_converts_estimates() {
    let (a, b) = (key("a"), key("b"));
    let mvtbl: MVHashMap<StateKey, WriteOp> = MVHashMap::new(3);

    mvtbl.write_estimates(
        1,
        2,
        vec![(a.clone(), value_for(1, 2)), (b.clone(), WriteOp::Deletion)],
        true,
    );
    assert_ok!(mvtbl.mark_committed(1));
    assert_ok_versioned(&mvtbl, &a, 2, (1, 2), Flag::Committed, value_for(1, 2));
    assert_ok_versioned(&mvtbl, &b, 2, (1, 2), Flag::Committed, WriteOp::Deletion);

    assert_some_eq!(mvtbl.data().mark_committed(&a, 1), Flag::Committed);
    assert_none!(mvtbl.data().mark_committed(&a, 0));
    // Nothing written: trivially committed.
    assert_ok!(mvtbl.mark_committed(0));
}

#[test]
fn keys_in_range_tracks_written_keys() {
    let mvtbl: MVHashMap<StateKey, WriteOp> = MVHashMap::new(3);
    mvtbl.data().set_base_value(key("p/0"), value_for(0, 0));
    mvtbl.write_estimates(
        0,
        0,
        vec![
            (key("p/2"), value_for(0, 0)),
            (key("q/1"), value_for(0, 0)),
        ],
        true,
    );
    mvtbl.write_estimates(2, 0, vec![(key("p/1"), WriteOp::Deletion)], true);

    // Only keys written by transactions are indexed, storage reads are not.
    assert_eq!(
        mvtbl.data().keys_in_range(prefix_range(b"p/")),
        vec![key("p/1"), key("p/2")]
    );

    // Invalidated keys stay in the index and resolve below the writer.
    mvtbl.invalidate(0);
    assert_eq!(
        mvtbl.data().keys_in_range(prefix_range(b"p/")),
        vec![key("p/1"), key("p/2")]
    );
    assert_err_eq!(mvtbl.data().fetch_data(&key("p/2"), 3), MVDataError::NotFound);
}

#[test]
fn stats_count_keys_and_entries() {
    let mvtbl: MVHashMap<StateKey, WriteOp> = MVHashMap::new(4);
    assert_eq!(mvtbl.stats(), BlockStateStats::default());
    assert_eq!(mvtbl.num_txns(), 4);

    mvtbl.data().set_base_value(key("x"), value_for(0, 0));
    mvtbl.write_estimates(0, 0, vec![(key("x"), value_for(0, 0))], true);
    mvtbl.write_estimates(
        3,
        0,
        vec![(key("x"), value_for(3, 0)), (key("y"), value_for(3, 0))],
        true,
    );

    assert_eq!(
        mvtbl.stats(),
        BlockStateStats {
            num_keys: 2,
            num_entries: 3,
        }
    );
}
