// Capability snapshots that gate obstacle tiles.
//
// The set of unlocked capabilities (e.g. "cut", "surf") is owned and mutated
// by an external collaborator. The engine only ever sees immutable
// `CapabilitySet` snapshots handed in through perception, and hashes them into
// cache signatures for the collision provider.
//
// See also: `collision.rs` which keys its grid cache on
// `CapabilitySet::signature_for()` and evicts grids on `changed()` keys.
//
// **Critical constraint: determinism.** Signatures hash the sorted key list
// with `FxHasher` (fixed seed), so the same set always produces the same
// signature across runs and platforms of the same pointer width.

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Name of an unlock that gates one or more obstacle tiles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CapabilityKey(pub String);

impl CapabilityKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CapabilityKey {
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read-only snapshot of the capabilities the agent currently holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    keys: BTreeSet<CapabilityKey>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<CapabilityKey>) -> Self {
        self.keys.insert(key.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<CapabilityKey>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn contains(&self, key: &CapabilityKey) -> bool {
        self.keys.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapabilityKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Signature of the whole set.
    pub fn signature(&self) -> u64 {
        let mut hasher = FxHasher::default();
        self.keys.len().hash(&mut hasher);
        for key in &self.keys {
            key.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Signature restricted to `relevant` keys: two sets that agree on which
    /// of those keys they hold produce the same value.
    pub fn signature_for(&self, relevant: &BTreeSet<CapabilityKey>) -> u64 {
        let mut hasher = FxHasher::default();
        for key in relevant {
            key.hash(&mut hasher);
            self.keys.contains(key).hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Keys present in exactly one of the two sets.
    pub fn changed(&self, other: &CapabilitySet) -> BTreeSet<CapabilityKey> {
        self.keys
            .symmetric_difference(&other.keys)
            .cloned()
            .collect()
    }
}

impl<K: Into<CapabilityKey>> FromIterator<K> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}
