//! # Plan Receivers
//!
//! The enumerator does not build plans itself. It hands every csg-cmp pair to a
//! [`PlanReceiver`], which in a full optimizer would cost the join and keep the best
//! plan per relation set. A receiver also answers which relation sets already have a
//! plan, because a pair may only be emitted once both halves are buildable.
//!
//! [`Counter`] is the receiver used to size a search space: it only counts.

use crate::bitmap::Bitmap;
use std::collections::BTreeMap;

/// Consumer of csg-cmp pairs.
pub trait PlanReceiver {
    /// Register a base relation before enumeration starts.
    fn add_node(&mut self, node: usize);

    /// Whether a plan for `set` has been produced.
    fn contains(&self, set: Bitmap) -> bool;

    /// Accept one pair. `edges` holds every edge joining `csg` with `cmp`.
    ///
    /// Returning `false` stops the enumeration.
    fn emit_csg_cmp(&mut self, csg: Bitmap, cmp: Bitmap, edges: Bitmap) -> bool;
}

/// Counts pairs per relation set, optionally up to a budget.
#[derive(Debug, Clone)]
pub struct Counter {
    counts: BTreeMap<Bitmap, usize>,
    nodes: Bitmap,
    remaining: usize,
    emitted: usize,
}

impl Counter {
    /// A counter without a budget.
    pub fn new() -> Self {
        Self::with_limit(usize::MAX)
    }

    /// A counter that accepts at most `limit` pairs.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            counts: BTreeMap::new(),
            nodes: Bitmap::EMPTY,
            remaining: limit,
            emitted: 0,
        }
    }

    /// Budget left. Never underflows: the pair that would take it below zero is refused.
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Number of pairs accepted.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Pairs accepted per relation set (the union of both halves).
    pub fn all_counts(&self) -> &BTreeMap<Bitmap, usize> {
        &self.counts
    }

    pub fn count(&self, set: Bitmap) -> usize {
        self.counts.get(&set).copied().unwrap_or(0)
    }
}

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanReceiver for Counter {
    fn add_node(&mut self, node: usize) {
        self.nodes.insert(node);
    }

    fn contains(&self, set: Bitmap) -> bool {
        if set.len() == 1 {
            return set.is_subset_of(self.nodes);
        }
        self.counts.contains_key(&set)
    }

    fn emit_csg_cmp(&mut self, csg: Bitmap, cmp: Bitmap, _edges: Bitmap) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.emitted += 1;
        *self.counts.entry(csg | cmp).or_insert(0) += 1;
        true
    }
}
