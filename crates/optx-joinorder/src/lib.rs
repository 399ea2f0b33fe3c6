//! # optx-joinorder: Join-Order Search Preparation
//!
//! Exhaustive join-order search is exponential in the number of relations. This crate
//! prepares a query's join graph before that search runs: it simplifies the graph until
//! the search space is small enough, then walks the remaining space pair by pair.
//!
//! ## Module Overview
//!
//! - **`hypergraph`**: The join graph. Relations are nodes, join predicates are
//!   hyperedges between disjoint relation sets.
//! - **`simplifier`**: Greedy simplification that fixes the relative order of joins,
//!   one step at a time, until the search space fits a limit.
//! - **`enumerator`**: DPhyp csg-cmp pair enumeration, each pair exactly once.
//! - **`receiver`**: The `PlanReceiver` trait the enumerator feeds, and the `Counter`
//!   receiver used to size search spaces.
//! - **`prepare`**: Both phases behind one call with configurable limits.
//! - **`cost`**: Log-space C_out cost model used to rank simplification steps.
//! - **`stats`**: Relation statistics and default join selectivity.
//! - **`bitmap`**: 64-bit relation and edge sets.
//! - **`builder`**: Fluent and random graph construction.
//!
//! ## Capacity
//!
//! Relation sets and edge sets are single 64-bit words. A graph holds at most 64
//! relations and 64 join predicates; exceeding either is a construction error.

pub mod bitmap;
pub mod builder;
pub mod cost;
pub mod enumerator;
pub mod error;
pub mod hypergraph;
pub mod prepare;
pub mod receiver;
pub mod simplifier;
pub mod stats;

pub use bitmap::Bitmap;
pub use error::HyperGraphError;
pub use hypergraph::{HyperGraph, JoinType};
pub use simplifier::{GraphSimplifier, SimplificationStep};
