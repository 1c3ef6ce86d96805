// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{key, value_for};
use crate::{
    types::{MVDataError, ObservedVersion, TxnIndex},
    MVHashMap,
};
use occ_types::{state_store::StateKey, write_set::WriteOp};
use proptest::{collection::vec, prelude::*, sample::Index};
use proptest_derive::Arbitrary;
use rayon::prelude::*;
use std::collections::BTreeMap;

const KEY_SPACE: usize = 8;

#[derive(Arbitrary, Clone, Debug)]
enum Operator {
    Write,
    Delete,
    Skip,
}

#[derive(Arbitrary, Clone, Debug)]
struct TxnOps {
    ops: Vec<(Index, Operator)>,
    invalidated: bool,
}

fn key_at(idx: &Index) -> StateKey {
    key(&format!("key_{}", idx.index(KEY_SPACE)))
}

// The latest write below `reader`, ignoring invalidated transactions.
fn baseline(txns: &[TxnOps], k: &StateKey, reader: usize) -> Option<(TxnIndex, WriteOp)> {
    txns[..reader]
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, txn)| !txn.invalidated)
        .find_map(|(idx, txn)| {
            let mut found = None;
            for (key_idx, op) in txn.ops.iter() {
                if &key_at(key_idx) != k {
                    continue;
                }
                match op {
                    Operator::Write => found = Some(value_for(idx as TxnIndex, 0)),
                    Operator::Delete => found = Some(WriteOp::Deletion),
                    Operator::Skip => {},
                }
            }
            found.map(|op| (idx as TxnIndex, op))
        })
}

fn run_and_check(txns: Vec<TxnOps>) -> Result<(), TestCaseError> {
    let num_txns = txns.len();
    let map: MVHashMap<StateKey, WriteOp> = MVHashMap::new(num_txns as TxnIndex);

    (0..num_txns).into_par_iter().for_each(|idx| {
        let mut writes = BTreeMap::new();
        for (key_idx, op) in txns[idx].ops.iter() {
            match op {
                Operator::Write => {
                    writes.insert(key_at(key_idx), value_for(idx as TxnIndex, 0));
                },
                Operator::Delete => {
                    writes.insert(key_at(key_idx), WriteOp::Deletion);
                },
                Operator::Skip => {},
            }
        }
        map.write_estimates(idx as TxnIndex, 0, writes, true);
        if txns[idx].invalidated {
            map.invalidate(idx as TxnIndex);
        }
    });

    for reader in 0..=num_txns {
        for key_idx in 0..KEY_SPACE {
            let k = key(&format!("key_{}", key_idx));
            let expected = baseline(&txns, &k, reader);
            match (map.data().fetch_data(&k, reader as TxnIndex), expected) {
                (Err(MVDataError::NotFound), None) => {},
                (Ok(output), Some((author, op))) => {
                    prop_assert_eq!(
                        output.observed_version(),
                        ObservedVersion::Versioned((author, 0))
                    );
                    prop_assert_eq!(output.value().as_ref(), &op);
                },
                (actual, expected) => {
                    prop_assert!(
                        false,
                        "reader {} key {:?}: {:?} vs {:?}",
                        reader,
                        k,
                        actual,
                        expected
                    );
                },
            }
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concurrent_writes_resolve_like_baseline(
        txns in vec(any::<TxnOps>(), 1..40),
    ) {
        run_and_check(txns)?;
    }
}
