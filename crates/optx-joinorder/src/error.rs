use crate::bitmap::Bitmap;

/// Errors raised while building a [`HyperGraph`](crate::hypergraph::HyperGraph).
///
/// These are usage errors: the caller handed in a graph this crate cannot represent.
/// Nothing here is retried and construction stops at the first one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HyperGraphError {
    /// More relations than fit in one node bitmap.
    #[error("join graph holds at most {capacity} relations")]
    NodeCapacityExceeded { capacity: usize },
    /// More join predicates than fit in one edge bitmap.
    #[error("join graph holds at most {capacity} join predicates")]
    EdgeCapacityExceeded { capacity: usize },
    /// One side of a join predicate references no relation.
    #[error("join predicate {edge} has an empty side")]
    EmptyEndpoint { edge: usize },
    /// The two sides of a join predicate share relations.
    #[error("join predicate sides {left} and {right} overlap")]
    OverlappingEndpoints { left: Bitmap, right: Bitmap },
    /// A join predicate references relations that were never added.
    #[error("join predicate references unknown relations {nodes}")]
    UnknownNodes { nodes: Bitmap },
    /// A relation index no graph can hold, so no bitmap can name it.
    #[error("join predicate references unknown relation {index}")]
    UnknownNode { index: usize },
    /// Selectivity outside `(0, 1]`.
    #[error("invalid join selectivity {selectivity}")]
    InvalidSelectivity { selectivity: f64 },
}
