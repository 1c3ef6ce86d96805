// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use bytes::Bytes;
#[cfg(any(test, feature = "fuzzing"))]
use proptest::{arbitrary::Arbitrary, prelude::*};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::Bound};

/// An opaque key into the global state. Keys are totally ordered by their raw bytes
/// (lexicographically), which every replica must agree on.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct StateKey(Bytes);

impl StateKey {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn from_static(bytes: &'static [u8]) -> Self {
        Self(Bytes::from_static(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Concatenates the key with `suffix`, e.g. to derive keys under a namespace.
    pub fn join(&self, suffix: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(self.0.len() + suffix.len());
        bytes.extend_from_slice(&self.0);
        bytes.extend_from_slice(suffix);
        Self(bytes.into())
    }
}

impl From<&str> for StateKey {
    fn from(key: &str) -> Self {
        Self(Bytes::copy_from_slice(key.as_bytes()))
    }
}

impl From<Vec<u8>> for StateKey {
    fn from(key: Vec<u8>) -> Self {
        Self(key.into())
    }
}

impl fmt::Debug for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StateKey({})",
            self.0
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect::<String>()
        )
    }
}

#[cfg(any(test, feature = "fuzzing"))]
impl Arbitrary for StateKey {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        any::<Vec<u8>>().prop_map(StateKey::from).boxed()
    }
}

/// Half-open range `[prefix, successor(prefix))` containing exactly the keys that start
/// with `prefix`. The upper bound is unbounded when no finite successor exists (empty
/// prefix or a prefix made only of 0xff bytes).
pub fn prefix_range(prefix: &[u8]) -> (Bound<StateKey>, Bound<StateKey>) {
    let start = Bound::Included(StateKey::new(Bytes::copy_from_slice(prefix)));

    let mut upper = prefix.to_vec();
    while let Some(last) = upper.pop() {
        if last < u8::MAX {
            upper.push(last + 1);
            return (start, Bound::Excluded(StateKey::from(upper)));
        }
    }
    (start, Bound::Unbounded)
}
