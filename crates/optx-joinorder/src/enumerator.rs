//! # Connected-Subgraph Enumeration
//!
//! Generates every csg-cmp pair of a hypergraph exactly once, following DPhyp
//! (Moerkotte & Neumann, "Dynamic Programming Strikes Back").
//!
//! ## How It Works
//!
//! Nodes are seeded in descending index order. Each seed `v` may only grow into nodes
//! with a higher index; everything up to `v` is in the exclusion set. That single rule
//! gives every connected subgraph exactly one seed (its lowest node) and one growth
//! path, so no subgraph is produced twice. Seeding in ascending order would let a later
//! seed regrow subgraphs an earlier one already covered; descending order also means
//! every subgraph is emitted after all of its own subsets.
//!
//! For each connected subgraph `S1`:
//!
//! 1. `emit_csg` looks at the neighborhood of `S1`, excluding everything up to the
//!    lowest node of `S1`, and seeds complements from its nodes in descending order.
//! 2. `enumerate_cmp_rec` grows each complement `S2` the same way. A pair is handed to
//!    the receiver when both halves are buildable and an edge joins them.
//! 3. `enumerate_csg_rec` grows `S1` itself by subsets of its neighborhood.
//!
//! ## Neighborhood
//!
//! For a hyperedge `(L, R)` with `L ⊆ S` and `R` disjoint from `S ∪ X`, only the lowest
//! node of `R` is a neighbor. The rest of `R` is reached by growing from that
//! representative, which keeps the neighborhood small and the emission unique.
//!
//! ## Budget
//!
//! The receiver may refuse a pair (a [`Counter`](crate::receiver::Counter) does once its
//! budget is spent). Enumeration then unwinds immediately and ends `Halted`.

use crate::bitmap::Bitmap;
use crate::hypergraph::HyperGraph;
use crate::receiver::PlanReceiver;
use serde::Serialize;
use tracing::debug;

/// Lifecycle of one enumeration pass. `Done` and `Halted` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnumerationState {
    Idle,
    Enumerating,
    Done,
    Halted,
}

/// One pass of csg-cmp enumeration over a graph.
pub struct SubgraphEnumerator<'a, R: PlanReceiver + ?Sized> {
    graph: &'a HyperGraph,
    receiver: &'a mut R,
    /// Current sides of the edges that take part in growth (absorbed duplicates skipped).
    sides: Vec<(Bitmap, Bitmap)>,
    state: EnumerationState,
}

impl<'a, R: PlanReceiver + ?Sized> SubgraphEnumerator<'a, R> {
    pub fn new(graph: &'a HyperGraph, receiver: &'a mut R) -> Self {
        let sides = (0..graph.edge_count())
            .filter(|&i| graph.absorbed_into(i).is_none())
            .map(|i| (graph.edge(i).left(), graph.edge(i).right()))
            .collect();
        Self {
            graph,
            receiver,
            sides,
            state: EnumerationState::Idle,
        }
    }

    pub fn state(&self) -> EnumerationState {
        self.state
    }

    /// Run the enumeration. Returns `true` if every pair was emitted and `false` if the
    /// receiver stopped it early.
    ///
    /// Only the first call enumerates. Later calls report the final outcome again.
    pub fn enumerate(&mut self) -> bool {
        if self.state != EnumerationState::Idle {
            return self.state == EnumerationState::Done;
        }
        self.state = EnumerationState::Enumerating;

        let node_count = self.graph.node_count();
        for node in 0..node_count {
            self.receiver.add_node(node);
        }

        let mut complete = true;
        for node in (0..node_count).rev() {
            let seed = Bitmap::singleton(node);
            if !self.emit_csg(seed) || !self.enumerate_csg_rec(seed, Bitmap::up_to(node)) {
                complete = false;
                break;
            }
        }

        self.state = if complete {
            EnumerationState::Done
        } else {
            EnumerationState::Halted
        };
        debug!(
            nodes = node_count,
            edges = self.sides.len(),
            state = ?self.state,
            "subgraph enumeration finished"
        );
        complete
    }

    /// Lowest node of every edge side reachable from `set` that avoids `excluded`.
    fn neighborhood(&self, set: Bitmap, excluded: Bitmap) -> Bitmap {
        let forbidden = set | excluded;
        let mut neighbors = Bitmap::EMPTY;
        for &(left, right) in &self.sides {
            if left.is_subset_of(set) && !right.overlaps(forbidden) {
                neighbors |= right.lowest();
            } else if right.is_subset_of(set) && !left.overlaps(forbidden) {
                neighbors |= left.lowest();
            }
        }
        neighbors
    }

    fn is_joinable(&self, a: Bitmap, b: Bitmap) -> bool {
        self.sides.iter().any(|&(left, right)| {
            (left.is_subset_of(a) && right.is_subset_of(b))
                || (left.is_subset_of(b) && right.is_subset_of(a))
        })
    }

    fn emit_pair(&mut self, csg: Bitmap, cmp: Bitmap) -> bool {
        let edges = self.graph.connecting_edges(csg, cmp);
        self.receiver.emit_csg_cmp(csg, cmp, edges)
    }

    fn emit_csg(&mut self, csg: Bitmap) -> bool {
        let excluded = csg | csg.up_to_lowest();
        let neighbors = self.neighborhood(csg, excluded);
        for node in neighbors.iter_rev() {
            let cmp = Bitmap::singleton(node);
            if self.is_joinable(csg, cmp) && !self.emit_pair(csg, cmp) {
                return false;
            }
            let cmp_excluded = excluded | (neighbors & Bitmap::up_to(node));
            if !self.enumerate_cmp_rec(csg, cmp, cmp_excluded) {
                return false;
            }
        }
        true
    }

    fn enumerate_csg_rec(&mut self, csg: Bitmap, excluded: Bitmap) -> bool {
        let neighbors = self.neighborhood(csg, excluded);
        for grow in neighbors.subsets() {
            let grown = csg | grow;
            if self.receiver.contains(grown) && !self.emit_csg(grown) {
                return false;
            }
        }
        let excluded = excluded | neighbors;
        for grow in neighbors.subsets() {
            if !self.enumerate_csg_rec(csg | grow, excluded) {
                return false;
            }
        }
        true
    }

    fn enumerate_cmp_rec(&mut self, csg: Bitmap, cmp: Bitmap, excluded: Bitmap) -> bool {
        let neighbors = self.neighborhood(cmp, excluded);
        for grow in neighbors.subsets() {
            let grown = cmp | grow;
            if self.receiver.contains(grown)
                && self.is_joinable(csg, grown)
                && !self.emit_pair(csg, grown)
            {
                return false;
            }
        }
        let excluded = excluded | neighbors;
        for grow in neighbors.subsets() {
            if !self.enumerate_cmp_rec(csg, cmp | grow, excluded) {
                return false;
            }
        }
        true
    }
}
