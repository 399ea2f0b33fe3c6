//! Fluent construction of join graphs, plus seeded random graphs for tests and benches.

use crate::bitmap::{Bitmap, CAPACITY};
use crate::error::HyperGraphError;
use crate::hypergraph::{HyperGraph, JoinType};
use crate::stats::Statistics;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

enum Pending {
    Node(String, Statistics),
    Edge {
        join_type: JoinType,
        left: Vec<usize>,
        right: Vec<usize>,
        selectivity: Option<f64>,
    },
}

fn node_set(nodes: &[usize]) -> Result<Bitmap, HyperGraphError> {
    if let Some(&index) = nodes.iter().find(|&&n| n >= CAPACITY) {
        return Err(HyperGraphError::UnknownNode { index });
    }
    Ok(nodes.iter().copied().collect())
}

/// Collects relations and joins, validating everything in [`build`](Self::build).
///
/// ```
/// use optx_joinorder::builder::HyperGraphBuilder;
/// use optx_joinorder::hypergraph::JoinType;
///
/// let graph = HyperGraphBuilder::new()
///     .node("orders", 1_500_000.0)
///     .node("customer", 150_000.0)
///     .join(JoinType::Inner, 0, 1)
///     .build()
///     .unwrap();
/// assert_eq!(graph.edge_count(), 1);
/// ```
#[derive(Default)]
pub struct HyperGraphBuilder {
    pending: Vec<Pending>,
}

impl HyperGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(self, name: impl Into<String>, row_count: f64) -> Self {
        self.node_with_stats(name, Statistics::new(row_count))
    }

    pub fn node_with_stats(mut self, name: impl Into<String>, stats: Statistics) -> Self {
        self.pending.push(Pending::Node(name.into(), stats));
        self
    }

    /// A join between two single relations.
    pub fn join(self, join_type: JoinType, left: usize, right: usize) -> Self {
        self.hyper_join(join_type, &[left], &[right])
    }

    /// A join between two relation sets.
    pub fn hyper_join(mut self, join_type: JoinType, left: &[usize], right: &[usize]) -> Self {
        self.pending.push(Pending::Edge {
            join_type,
            left: left.to_vec(),
            right: right.to_vec(),
            selectivity: None,
        });
        self
    }

    pub fn join_with_selectivity(
        mut self,
        join_type: JoinType,
        left: usize,
        right: usize,
        selectivity: f64,
    ) -> Self {
        self.pending.push(Pending::Edge {
            join_type,
            left: vec![left],
            right: vec![right],
            selectivity: Some(selectivity),
        });
        self
    }

    pub fn build(self) -> Result<HyperGraph, HyperGraphError> {
        let mut graph = HyperGraph::new();
        for pending in self.pending {
            match pending {
                Pending::Node(name, stats) => {
                    graph.add_node(name, stats)?;
                }
                Pending::Edge {
                    join_type,
                    left,
                    right,
                    selectivity,
                } => {
                    let (left, right) = (node_set(&left)?, node_set(&right)?);
                    match selectivity {
                        Some(sel) => {
                            graph.add_edge_with_selectivity(join_type, left, right, sel)?
                        }
                        None => graph.add_edge(join_type, left, right)?,
                    };
                }
            }
        }
        Ok(graph)
    }
}

/// A connected random graph of inner joins.
///
/// Row counts are drawn from `1..=1000`. A random spanning tree keeps the graph
/// connected; the remaining edges join distinct, not yet joined pairs, so `edge_count`
/// is clamped to `node_count * (node_count - 1) / 2`.
pub fn random_graph(
    node_count: usize,
    edge_count: usize,
    seed: u64,
) -> Result<HyperGraph, HyperGraphError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut builder = HyperGraphBuilder::new();
    for i in 0..node_count {
        let rows = rng.gen_range(1..=1000) as f64;
        builder = builder.node(format!("t{}", i), rows);
    }

    let mut joined = Vec::new();
    for i in 1..node_count {
        let j = rng.gen_range(0..i);
        joined.push((j, i));
        builder = builder.join(JoinType::Inner, j, i);
    }

    let mut extra: Vec<(usize, usize)> = (0..node_count)
        .flat_map(|a| (a + 1..node_count).map(move |b| (a, b)))
        .filter(|pair| !joined.contains(pair))
        .collect();
    extra.shuffle(&mut rng);
    let wanted = edge_count.saturating_sub(node_count.saturating_sub(1));
    for (a, b) in extra.into_iter().take(wanted) {
        builder = builder.join(JoinType::Inner, a, b);
    }

    builder.build()
}
