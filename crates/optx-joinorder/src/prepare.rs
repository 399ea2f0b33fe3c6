//! # Join Search Preparation
//!
//! Ties simplification and enumeration together the way a join-order search uses them:
//!
//! 1. Simplify the graph until at most `subgraph_limit` csg-cmp pairs remain, or until
//!    no legal step is left.
//! 2. Enumerate the simplified graph once with a [`Counter`] capped at
//!    `enumeration_budget` pairs. A real search would pass its own receiver here.
//!
//! The returned [`PrepareOutcome`] is a diagnostic summary of both phases.

use crate::bitmap::Bitmap;
use crate::enumerator::{EnumerationState, SubgraphEnumerator};
use crate::hypergraph::HyperGraph;
use crate::receiver::Counter;
use crate::simplifier::{GraphSimplifier, SimplificationStep};
use serde::Serialize;
use tracing::debug;

/// Knobs for [`prepare_join_search`].
#[derive(Debug, Clone)]
pub struct PrepareConfig {
    /// Target upper bound on csg-cmp pairs after simplification.
    pub subgraph_limit: usize,
    /// Hard cap on pairs handed out by the enumeration pass.
    pub enumeration_budget: usize,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            subgraph_limit: 1_000,
            enumeration_budget: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareOutcome {
    pub steps: Vec<SimplificationStep>,
    /// Whether simplification reached `subgraph_limit`.
    pub within_limit: bool,
    pub total_order: bool,
    pub csg_cmp_pairs: usize,
    pub enumeration_state: EnumerationState,
    /// Whether the full relation set has a plan, i.e. the search can finish.
    pub complete_plan: bool,
}

/// Simplify `graph` in place, then enumerate it under the configured budget.
pub fn prepare_join_search(graph: &mut HyperGraph, config: &PrepareConfig) -> PrepareOutcome {
    let (steps, within_limit, total_order) = {
        let mut simplifier = GraphSimplifier::new(graph);
        let within_limit = simplifier.simplify_graph(config.subgraph_limit);
        (simplifier.steps(), within_limit, simplifier.is_total_order())
    };

    let mut counter = Counter::with_limit(config.enumeration_budget);
    let enumeration_state = {
        let mut enumerator = SubgraphEnumerator::new(graph, &mut counter);
        enumerator.enumerate();
        enumerator.state()
    };
    let all = graph.all_nodes();
    let complete_plan = all.len() <= 1 || counter.count(all) > 0;

    debug!(
        steps = steps.len(),
        within_limit,
        total_order,
        pairs = counter.emitted(),
        state = ?enumeration_state,
        "join search prepared"
    );

    PrepareOutcome {
        steps,
        within_limit,
        total_order,
        csg_cmp_pairs: counter.emitted(),
        enumeration_state,
        complete_plan,
    }
}

impl PrepareOutcome {
    /// Steps as `(left, right)` relation sets.
    pub fn step_sets(&self) -> Vec<(Bitmap, Bitmap)> {
        self.steps.iter().map(|s| (s.left, s.right)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{random_graph, HyperGraphBuilder};
    use crate::hypergraph::JoinType;

    #[test]
    fn test_small_graph_needs_no_steps() {
        let mut g = HyperGraphBuilder::new()
            .node("a", 10.0)
            .node("b", 20.0)
            .node("c", 30.0)
            .join(JoinType::Inner, 0, 1)
            .join(JoinType::Inner, 1, 2)
            .build()
            .unwrap();
        let outcome = prepare_join_search(&mut g, &PrepareConfig::default());
        assert!(outcome.steps.is_empty());
        assert!(outcome.within_limit);
        assert_eq!(outcome.csg_cmp_pairs, 4);
        assert_eq!(outcome.enumeration_state, EnumerationState::Done);
        assert!(outcome.complete_plan);
    }

    #[test]
    fn test_dense_graph_is_bounded() {
        let mut g = random_graph(10, 20, 3).unwrap();
        let config = PrepareConfig {
            subgraph_limit: 200,
            ..PrepareConfig::default()
        };
        let outcome = prepare_join_search(&mut g, &config);
        if outcome.within_limit {
            assert!(outcome.csg_cmp_pairs <= 200);
        }
        assert!(!outcome.steps.is_empty());
        assert_eq!(outcome.enumeration_state, EnumerationState::Done);
        assert!(outcome.complete_plan);
        assert_eq!(outcome.step_sets().len(), outcome.steps.len());
    }

    #[test]
    fn test_budget_halts_enumeration() {
        let mut g = random_graph(8, 16, 9).unwrap();
        let config = PrepareConfig {
            subgraph_limit: usize::MAX,
            enumeration_budget: 5,
        };
        let outcome = prepare_join_search(&mut g, &config);
        assert!(outcome.steps.is_empty());
        assert_eq!(outcome.csg_cmp_pairs, 5);
        assert_eq!(outcome.enumeration_state, EnumerationState::Halted);
    }
}
