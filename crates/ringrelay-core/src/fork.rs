//! Deterministic ordering of chain events and fork reconciliation.
//!
//! Events from different topics arrive in no particular order. Consumers that
//! need causal order sort by [`ForkKey`]: block number ascending, then log
//! index ascending. The same ordering drives [`reconcile`], which compares a
//! previously recorded sequence against a later report of the same block
//! range and tells the caller what to roll back and what to re-apply.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `(block_number, log_index)` ordering key.
///
/// The derived `Ord` compares block number first, so log index only breaks
/// ties within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkKey {
    pub block_number: u64,
    pub log_index: i64,
}

impl ForkKey {
    pub fn new(block_number: u64, log_index: i64) -> Self {
        Self {
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for ForkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.block_number, self.log_index)
    }
}

/// An event tagged with its ordering key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEvent<T = ()> {
    pub key: ForkKey,
    pub event: T,
}

impl<T> ForkEvent<T> {
    pub fn new(key: ForkKey, event: T) -> Self {
        Self { key, event }
    }
}

/// A sortable list of keyed events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEventList<T = ()> {
    events: Vec<ForkEvent<T>>,
}

impl<T> Default for ForkEventList<T> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<T> ForkEventList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: ForkKey, event: T) {
        self.events.push(ForkEvent::new(key, event));
    }

    /// Sort in place by key. Stable: events sharing a key keep arrival order.
    pub fn sort(&mut self) {
        self.events.sort_by_key(|e| e.key);
    }

    pub fn is_sorted(&self) -> bool {
        self.events.windows(2).all(|w| w[0].key <= w[1].key)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ForkEvent<T>> {
        self.events.iter()
    }

    pub fn keys(&self) -> Vec<ForkKey> {
        self.events.iter().map(|e| e.key).collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn first(&self) -> Option<&ForkEvent<T>> {
        self.events.first()
    }

    pub fn last(&self) -> Option<&ForkEvent<T>> {
        self.events.last()
    }

    pub fn into_inner(self) -> Vec<ForkEvent<T>> {
        self.events
    }
}

impl ForkEventList<()> {
    /// Build a key-only list.
    pub fn from_keys(keys: impl IntoIterator<Item = ForkKey>) -> Self {
        keys.into_iter().map(|k| ForkEvent::new(k, ())).collect()
    }
}

impl<T> FromIterator<ForkEvent<T>> for ForkEventList<T> {
    fn from_iter<I: IntoIterator<Item = ForkEvent<T>>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for ForkEventList<T> {
    type Item = ForkEvent<T>;
    type IntoIter = std::vec::IntoIter<ForkEvent<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ForkEventList<T> {
    type Item = &'a ForkEvent<T>;
    type IntoIter = std::slice::Iter<'a, ForkEvent<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// Outcome of comparing a recorded sequence with a later observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation<T> {
    /// Key of the last event both sequences agree on, `None` when they
    /// diverge before any shared event.
    pub fork_point: Option<ForkKey>,
    /// Recorded events to undo, newest first.
    pub rolled_back: Vec<ForkEvent<T>>,
    /// Observed events to apply, oldest first.
    pub applied: Vec<ForkEvent<T>>,
}

impl<T> Reconciliation<T> {
    /// `true` when previously recorded state has to be undone. `false` means
    /// the observation only extends what was recorded.
    pub fn is_reorg(&self) -> bool {
        !self.rolled_back.is_empty()
    }
}

/// Compare `recorded` against `observed`, a later report covering the block
/// range `[first observed block, last observed block]`.
///
/// Recorded events below that range are taken as settled. Inside the range
/// both sequences are sorted and walked in step until the first key or
/// payload mismatch. Everything recorded after the common prefix, including
/// recorded events above the observed range, is returned for rollback.
/// Returns `None` when the range matches exactly or `observed` is empty.
pub fn reconcile<T: Clone + PartialEq>(
    recorded: &ForkEventList<T>,
    observed: &ForkEventList<T>,
) -> Option<Reconciliation<T>> {
    let mut recorded = recorded.clone();
    recorded.sort();
    let mut observed = observed.clone();
    observed.sort();

    let start = observed.first()?.key.block_number;
    let end = observed.last()?.key.block_number;

    let recorded = recorded.into_inner();
    let observed = observed.into_inner();

    let below = recorded
        .iter()
        .take_while(|e| e.key.block_number < start)
        .count();
    let in_range = recorded[below..]
        .iter()
        .take_while(|e| e.key.block_number <= end)
        .count();
    let window = &recorded[below..below + in_range];

    let common = window
        .iter()
        .zip(observed.iter())
        .take_while(|(r, o)| r.key == o.key && r.event == o.event)
        .count();

    if common == window.len() && common == observed.len() {
        return None;
    }

    let fork_point = if common > 0 {
        Some(window[common - 1].key)
    } else if below > 0 {
        Some(recorded[below - 1].key)
    } else {
        None
    };

    let rolled_back: Vec<_> = recorded[below + common..].iter().rev().cloned().collect();
    let applied: Vec<_> = observed[common..].to_vec();

    tracing::warn!(
        fork_point = ?fork_point,
        rolled_back = rolled_back.len(),
        applied = applied.len(),
        "event sequence diverged from recorded history"
    );

    Some(Reconciliation {
        fork_point,
        rolled_back,
        applied,
    })
}
