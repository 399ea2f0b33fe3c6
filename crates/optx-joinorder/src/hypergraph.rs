//! # Join Hypergraph
//!
//! The join graph of one query block. Nodes are base relations, hyperedges are join
//! predicates whose two sides are disjoint, non-empty sets of relations.
//!
//! ## Storage
//!
//! Nodes and edges live in dense vectors and are addressed by index. The index doubles
//! as the bit position in node and edge [`Bitmap`]s, which caps a graph at
//! [`CAPACITY`] relations and [`CAPACITY`] predicates. Edges are never physically
//! removed: an edge made redundant by simplification stays in place and is reported as
//! absorbed (see [`HyperGraph::absorbed_into`]), so indexes held elsewhere stay valid.
//!
//! ## Original and Current Endpoints
//!
//! Every edge keeps the endpoints it was created with next to its current ones. The
//! simplifier only ever grows the current endpoints; cardinality estimation always
//! works on the original ones, because simplification changes the order joins are
//! evaluated in, not what they compute.
//!
//! ## Adjacency Index
//!
//! For each node the graph keeps the bitmap of edges currently touching it. The index is
//! refreshed on every endpoint rewrite, so neighbor lookups never scan the edge list.

use crate::bitmap::{Bitmap, CAPACITY};
use crate::error::HyperGraphError;
use crate::stats::{equi_join_selectivity, Statistics};
use serde::{Deserialize, Serialize};

/// Join kinds carried by a hyperedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    /// Inner join: only matching rows from both sides.
    Inner,
    /// Left outer join: all rows from left, matching from right (or NULLs).
    Left,
    /// Right outer join: all rows from right, matching from left (or NULLs).
    Right,
    /// Full outer join: all rows from both sides, NULLs where no match.
    Full,
    /// Semi join: left rows that have at least one match on the right.
    Semi,
    /// Anti join: left rows that have no match on the right.
    Anti,
    /// Cross join: Cartesian product, no predicate.
    Cross,
}

impl JoinType {
    /// Whether `A op B` equals `B op A`.
    pub fn is_commutative(self) -> bool {
        matches!(self, JoinType::Inner | JoinType::Full | JoinType::Cross)
    }

    /// Whether other joins may be evaluated below this one on `side`.
    ///
    /// Only the row-preserving side of an outer, semi or anti join accepts more
    /// relations. Growing the other side would change which rows get NULL-extended
    /// or filtered.
    pub fn allows_growth(self, side: Side) -> bool {
        match self {
            JoinType::Inner | JoinType::Cross => true,
            JoinType::Left | JoinType::Semi | JoinType::Anti => side == Side::Left,
            JoinType::Right => side == Side::Right,
            JoinType::Full => false,
        }
    }
}

/// One of the two sides of a hyperedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

/// A base relation.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub stats: Statistics,
}

/// A join predicate between two disjoint relation sets.
#[derive(Debug, Clone)]
pub struct Edge {
    pub join_type: JoinType,
    /// Fraction of the cross product of both sides that survives the predicate.
    pub selectivity: f64,
    left: Bitmap,
    right: Bitmap,
    original_left: Bitmap,
    original_right: Bitmap,
}

impl Edge {
    pub fn left(&self) -> Bitmap {
        self.left
    }

    pub fn right(&self) -> Bitmap {
        self.right
    }

    pub fn endpoint(&self, side: Side) -> Bitmap {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn original_endpoint(&self, side: Side) -> Bitmap {
        match side {
            Side::Left => self.original_left,
            Side::Right => self.original_right,
        }
    }

    /// All relations the edge currently references.
    pub fn nodes(&self) -> Bitmap {
        self.left | self.right
    }

    /// Relations the predicate itself references.
    pub fn original_nodes(&self) -> Bitmap {
        self.original_left | self.original_right
    }

    /// True if this edge joins `a` with `b` (in either orientation).
    pub fn connects(&self, a: Bitmap, b: Bitmap) -> bool {
        (self.left.is_subset_of(a) && self.right.is_subset_of(b))
            || (self.left.is_subset_of(b) && self.right.is_subset_of(a))
    }
}

/// The mutable join graph shared by the simplifier and the enumerator.
#[derive(Debug, Clone, Default)]
pub struct HyperGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    /// `incident[n]` = edges whose current endpoints contain node `n`.
    incident: Vec<Bitmap>,
}

impl HyperGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relation and return its index (its bit position).
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        stats: Statistics,
    ) -> Result<usize, HyperGraphError> {
        if self.nodes.len() >= CAPACITY {
            return Err(HyperGraphError::NodeCapacityExceeded { capacity: CAPACITY });
        }
        self.nodes.push(Node {
            name: name.into(),
            stats,
        });
        self.incident.push(Bitmap::EMPTY);
        Ok(self.nodes.len() - 1)
    }

    /// Add a join predicate with a selectivity derived from the endpoint row counts.
    pub fn add_edge(
        &mut self,
        join_type: JoinType,
        left: Bitmap,
        right: Bitmap,
    ) -> Result<usize, HyperGraphError> {
        self.validate_endpoints(left, right)?;
        let selectivity = match join_type {
            JoinType::Cross => 1.0,
            _ => equi_join_selectivity(self.largest_stats(left), self.largest_stats(right), &[]),
        };
        self.push_edge(join_type, left, right, selectivity)
    }

    /// Add a join predicate with a caller-supplied selectivity in `(0, 1]`.
    pub fn add_edge_with_selectivity(
        &mut self,
        join_type: JoinType,
        left: Bitmap,
        right: Bitmap,
        selectivity: f64,
    ) -> Result<usize, HyperGraphError> {
        if !(selectivity > 0.0 && selectivity <= 1.0) {
            return Err(HyperGraphError::InvalidSelectivity { selectivity });
        }
        self.validate_endpoints(left, right)?;
        self.push_edge(join_type, left, right, selectivity)
    }

    fn validate_endpoints(&self, left: Bitmap, right: Bitmap) -> Result<(), HyperGraphError> {
        let edge = self.edges.len();
        if edge >= CAPACITY {
            return Err(HyperGraphError::EdgeCapacityExceeded { capacity: CAPACITY });
        }
        if left.is_empty() || right.is_empty() {
            return Err(HyperGraphError::EmptyEndpoint { edge });
        }
        if left.overlaps(right) {
            return Err(HyperGraphError::OverlappingEndpoints { left, right });
        }
        let unknown = (left | right) - self.all_nodes();
        if !unknown.is_empty() {
            return Err(HyperGraphError::UnknownNodes { nodes: unknown });
        }
        Ok(())
    }

    fn push_edge(
        &mut self,
        join_type: JoinType,
        left: Bitmap,
        right: Bitmap,
        selectivity: f64,
    ) -> Result<usize, HyperGraphError> {
        let index = self.edges.len();
        self.edges.push(Edge {
            join_type,
            selectivity,
            left,
            right,
            original_left: left,
            original_right: right,
        });
        for node in (left | right).iter() {
            self.incident[node].insert(index);
        }
        Ok(index)
    }

    /// Statistics of the largest relation in `set`.
    fn largest_stats(&self, set: Bitmap) -> &Statistics {
        let mut best = &self.nodes[set.lowest_index().unwrap_or(0)].stats;
        for node in set.iter() {
            let stats = &self.nodes[node].stats;
            if stats.row_count > best.row_count {
                best = stats;
            }
        }
        best
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn edge(&self, index: usize) -> &Edge {
        &self.edges[index]
    }

    /// The node universe.
    pub fn all_nodes(&self) -> Bitmap {
        Bitmap::first_n(self.nodes.len())
    }

    /// Edges currently touching at least one node of `subset`.
    pub fn neighbor_edges(&self, subset: Bitmap) -> Bitmap {
        let mut edges = Bitmap::EMPTY;
        for node in subset.iter() {
            edges |= self.incident[node];
        }
        edges
    }

    /// Rewrite the current endpoints of `edge`.
    ///
    /// Endpoints may only grow past the original ones and must stay non-empty, disjoint
    /// and inside the node universe. Anything else means the caller corrupted the graph
    /// and would poison every later enumeration, so it panics.
    pub(crate) fn set_endpoints(&mut self, edge: usize, left: Bitmap, right: Bitmap) {
        let universe = self.all_nodes();
        let e = &self.edges[edge];
        assert!(
            !left.is_empty() && !right.is_empty() && !left.overlaps(right),
            "edge {} rewritten to invalid endpoints {} / {}",
            edge,
            left,
            right
        );
        assert!(
            (left | right).is_subset_of(universe)
                && e.original_left.is_subset_of(left)
                && e.original_right.is_subset_of(right),
            "edge {} lost relations in rewrite to {} / {}",
            edge,
            left,
            right
        );

        for node in e.nodes().iter() {
            self.incident[node] = self.incident[node] - Bitmap::singleton(edge);
        }
        let e = &mut self.edges[edge];
        e.left = left;
        e.right = right;
        for node in (left | right).iter() {
            self.incident[node].insert(edge);
        }
    }

    /// The lower-indexed edge this one duplicates, if any.
    ///
    /// Two edges coincide when they have the same current sides and the same join kind.
    /// Commutative joins also match with their sides swapped. A duplicate adds nothing
    /// to the search space, so the enumerator skips it when growing subgraphs.
    pub fn absorbed_into(&self, edge: usize) -> Option<usize> {
        let e = &self.edges[edge];
        self.edges[..edge].iter().position(|other| {
            other.join_type == e.join_type
                && ((other.left == e.left && other.right == e.right)
                    || (e.join_type.is_commutative()
                        && other.left == e.right
                        && other.right == e.left))
        })
    }

    /// Natural log of the estimated row count of joining every relation in `set`.
    ///
    /// Product of base row counts and of the selectivities of all predicates whose
    /// relations fall inside `set`, floored at one row. Working in log space keeps
    /// products of up to 64 large relations finite.
    pub fn estimate_rows_ln(&self, set: Bitmap) -> f64 {
        let mut ln_rows: f64 = set
            .iter()
            .map(|node| self.nodes[node].stats.effective_rows().ln())
            .sum();
        for edge in &self.edges {
            if edge.original_nodes().is_subset_of(set) {
                ln_rows += edge.selectivity.ln();
            }
        }
        ln_rows.max(0.0)
    }

    pub fn estimate_rows(&self, set: Bitmap) -> f64 {
        self.estimate_rows_ln(set).exp()
    }

    /// Edges that can join `a` with `b`, absorbed duplicates included.
    pub fn connecting_edges(&self, a: Bitmap, b: Bitmap) -> Bitmap {
        self.neighbor_edges(a)
            .iter()
            .filter(|&i| self.edges[i].connects(a, b))
            .collect()
    }

    /// True if every relation is reachable from relation 0 through some edge.
    pub fn is_connected(&self) -> bool {
        if self.nodes.is_empty() {
            return true;
        }
        let mut reached = Bitmap::singleton(0);
        loop {
            let grown = self
                .neighbor_edges(reached)
                .iter()
                .fold(reached, |acc, i| acc | self.edges[i].nodes());
            if grown == reached {
                return reached == self.all_nodes();
            }
            reached = grown;
        }
    }
}
