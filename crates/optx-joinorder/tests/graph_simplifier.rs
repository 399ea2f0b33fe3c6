//! Graph simplification scenarios.
//!
//! Each test builds a join graph, simplifies it (stepwise or bounded), and checks the
//! result with a full csg-cmp enumeration.
//!
//! ## Topologies
//! - 5-relation star (exact step trace)
//! - 4-relation cycle and clique
//! - 12-relation star
//! - 6-relation graph with mixed fan-out
//! - seeded random graphs (6/6, 7/12, 10/20 relations/joins)
//!
//! ## What These Tests Verify
//! - Simplifying to exhaustion leaves the joins totally ordered
//! - Each simplification step never grows the search space
//! - Bounded simplification respects its limit
//! - Traces are deterministic and undo/redo is exact

use optx_joinorder::builder::{random_graph, HyperGraphBuilder};
use optx_joinorder::enumerator::{EnumerationState, SubgraphEnumerator};
use optx_joinorder::hypergraph::Side;
use optx_joinorder::receiver::Counter;
use optx_joinorder::{GraphSimplifier, HyperGraph, JoinType};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn build(rows: &[f64], joins: &[(usize, usize)]) -> HyperGraph {
    let mut builder = HyperGraphBuilder::new();
    for (i, r) in rows.iter().enumerate() {
        builder = builder.node(format!("t{}", i), *r);
    }
    for &(a, b) in joins {
        builder = builder.join(JoinType::Inner, a, b);
    }
    builder.build().unwrap()
}

fn star(rows: &[f64]) -> HyperGraph {
    let joins: Vec<(usize, usize)> = (1..rows.len()).map(|leaf| (0, leaf)).collect();
    build(rows, &joins)
}

fn cycle() -> HyperGraph {
    build(&[10.0, 20.0, 30.0, 40.0], &[(0, 1), (0, 2), (0, 3), (1, 2), (2, 3)])
}

fn clique() -> HyperGraph {
    build(
        &[10.0, 20.0, 30.0, 40.0],
        &[(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)],
    )
}

fn mixed_fan_out() -> HyperGraph {
    build(
        &[6.0, 2.0, 1.0, 3.0, 5.0, 4.0],
        &[(3, 4), (3, 5), (2, 3), (2, 5), (2, 4), (1, 5), (1, 4), (0, 2)],
    )
}

fn enumerate(graph: &HyperGraph) -> Counter {
    let mut counter = Counter::new();
    let mut enumerator = SubgraphEnumerator::new(graph, &mut counter);
    assert!(enumerator.enumerate());
    assert_eq!(enumerator.state(), EnumerationState::Done);
    counter
}

/// Simplify to exhaustion, then check the joins are totally ordered and every
/// relation set is produced fewer than `max_count` times.
fn simplify_fully(mut graph: HyperGraph, max_count: usize) {
    let total_order = {
        let mut simplifier = GraphSimplifier::new(&mut graph);
        while simplifier.apply_simplification_step() {}
        assert!(simplifier.last_applied_step().is_none());
        simplifier.is_total_order()
    };
    let counter = enumerate(&graph);
    for (&set, &count) in counter.all_counts() {
        assert!(count < max_count, "{} produced {} times", set, count);
    }
    assert!(counter.count(graph.all_nodes()) > 0);
    assert!(total_order);
}

// ---------------------------------------------------------------------------
// Fixed topologies
// ---------------------------------------------------------------------------

#[test]
fn test_star_query_trace() {
    //      t1
    //      |
    // t3-- t0 -- t4
    //      |
    //      t2
    let mut graph = star(&[10.0, 20.0, 30.0, 40.0, 50.0]);
    let expected = [(17, 2), (17, 4), (17, 8), (25, 2), (25, 4), (29, 2)];
    let mut simplifier = GraphSimplifier::new(&mut graph);
    assert!(simplifier.last_applied_step().is_none());
    for step in expected {
        assert!(simplifier.apply_simplification_step());
        let applied = simplifier.last_applied_step().unwrap();
        assert_eq!(applied.as_bits(), step);
    }
    assert!(!simplifier.apply_simplification_step());
    assert!(simplifier.last_applied_step().is_none());
    assert!(simplifier.is_total_order());
    drop(simplifier);

    let counter = enumerate(&graph);
    assert!(counter.all_counts().values().all(|&c| c < 10));
    // A total order over four joins leaves one plan per intermediate result.
    assert_eq!(counter.emitted(), 4);
}

#[test]
fn test_chain_of_unit_relations_exhausts() {
    let mut graph = build(&[1.0, 1.0, 1.0], &[(0, 1), (1, 2)]);
    let mut simplifier = GraphSimplifier::new(&mut graph);
    while simplifier.apply_simplification_step() {}
    assert!(simplifier.last_applied_step().is_none());
    assert_eq!(simplifier.step_count(), 1);
}

#[test]
fn test_circle_graph() {
    simplify_fully(cycle(), 10);
}

#[test]
fn test_clique() {
    simplify_fully(clique(), 10);
}

#[test]
fn test_huge_star() {
    simplify_fully(
        star(&[
            10.0, 20.0, 30.0, 40.0, 50.0, 70.0, 60.0, 80.0, 90.0, 100.0, 110.0, 120.0,
        ]),
        10,
    );
}

#[test]
fn test_complex_query() {
    simplify_fully(mixed_fan_out(), 1000);
}

#[test]
fn test_empty_graph_has_no_steps() {
    let mut graph = HyperGraph::new();
    let mut simplifier = GraphSimplifier::new(&mut graph);
    assert!(!simplifier.apply_simplification_step());
    assert!(simplifier.last_applied_step().is_none());
    assert!(simplifier.is_total_order());
    assert!(simplifier.simplify_graph(0));
}

// ---------------------------------------------------------------------------
// Random graphs
// ---------------------------------------------------------------------------

#[test]
fn test_random_query() {
    for seed in 0..10 {
        let mut graph = random_graph(6, 6, seed).unwrap();
        {
            let mut simplifier = GraphSimplifier::new(&mut graph);
            while simplifier.apply_simplification_step() {}
            assert!(simplifier.is_total_order(), "seed {}", seed);
        }
        let counter = enumerate(&graph);
        assert!(counter.count(graph.all_nodes()) > 0, "seed {}", seed);
    }
}

#[test]
fn test_exhausted_random_graphs_are_totally_ordered() {
    // Dense graphs leave pairs that are locally orderable but blocked by earlier
    // orderings; those must not count as undecided.
    let shapes = (0..50)
        .map(|seed| (7, 12, seed))
        .chain((0..30).map(|seed| (10, 20, seed)));
    for (nodes, edges, seed) in shapes {
        let mut graph = random_graph(nodes, edges, seed).unwrap();
        let mut simplifier = GraphSimplifier::new(&mut graph);
        while simplifier.apply_simplification_step() {}
        assert!(
            simplifier.is_total_order(),
            "{}/{} seed {}",
            nodes,
            edges,
            seed
        );
    }
}

#[test]
fn test_limit() {
    for limit in (1000..10000).step_by(100) {
        let mut graph = random_graph(10, 20, limit as u64).unwrap();
        let mut simplifier = GraphSimplifier::new(&mut graph);
        let within = simplifier.simplify_graph(limit);
        if !within {
            // Giving up is only allowed once every legal step is applied.
            assert!(!simplifier.apply_simplification_step(), "limit {}", limit);
        }
        drop(simplifier);

        let mut counter = Counter::with_limit(limit);
        let complete = SubgraphEnumerator::new(&graph, &mut counter).enumerate();
        if within {
            assert!(complete, "limit {}", limit);
            assert!(counter.count(graph.all_nodes()) > 0);
        }
        assert_eq!(counter.emitted() + counter.remaining(), limit);
    }
}

#[test]
fn test_bounded_simplification_is_minimal() {
    let mut graph = random_graph(10, 20, 7).unwrap();
    let unbounded = enumerate(&graph).emitted();
    let limit = unbounded / 4;

    let mut simplifier = GraphSimplifier::new(&mut graph);
    assert!(simplifier.simplify_graph(limit));
    let steps = simplifier.step_count();
    assert!(steps > 0);

    // One step fewer no longer fits.
    assert!(simplifier.rollback_step());
    let mut counter = Counter::with_limit(limit);
    assert!(!SubgraphEnumerator::new(simplifier.graph(), &mut counter).enumerate());

    // The undone step is replayed before anything new.
    assert!(simplifier.apply_simplification_step());
    assert_eq!(simplifier.step_count(), steps);
    let mut counter = Counter::with_limit(limit);
    assert!(SubgraphEnumerator::new(simplifier.graph(), &mut counter).enumerate());
}

#[test]
fn test_steps_never_grow_search_space() {
    let mut graphs = vec![cycle(), clique(), mixed_fan_out()];
    for seed in 0..10 {
        graphs.push(random_graph(7, 12, seed).unwrap());
    }
    for mut graph in graphs {
        let mut previous = enumerate(&graph).emitted();
        let mut simplifier = GraphSimplifier::new(&mut graph);
        while simplifier.apply_simplification_step() {
            let pairs = enumerate(simplifier.graph()).emitted();
            assert!(pairs <= previous, "{} pairs after {}", pairs, previous);
            previous = pairs;
        }
    }
}

// ---------------------------------------------------------------------------
// Trace properties
// ---------------------------------------------------------------------------

#[test]
fn test_trace_is_deterministic() {
    let trace = |seed: u64| -> String {
        let mut graph = random_graph(9, 18, seed).unwrap();
        let mut simplifier = GraphSimplifier::new(&mut graph);
        while simplifier.apply_simplification_step() {}
        serde_json::to_string(&simplifier.steps()).unwrap()
    };
    for seed in [1, 5, 11] {
        assert_eq!(trace(seed), trace(seed));
    }
}

#[test]
fn test_last_applied_step_matches_trace() {
    let mut graph = mixed_fan_out();
    let mut simplifier = GraphSimplifier::new(&mut graph);
    while simplifier.apply_simplification_step() {
        let last = simplifier.last_applied_step().unwrap();
        assert_eq!(simplifier.steps().last(), Some(&last));
        let edge = simplifier.graph().edge(last.after_edge);
        assert_eq!((edge.left(), edge.right()), (last.left, last.right));
    }
    assert!(simplifier.last_applied_step().is_none());
}

#[test]
fn test_rewritten_edges_stay_valid() {
    for seed in 0..5 {
        let mut graph = random_graph(10, 20, seed).unwrap();
        let mut simplifier = GraphSimplifier::new(&mut graph);
        while simplifier.apply_simplification_step() {}
        for edge in simplifier.graph().edges() {
            assert!(!edge.left().is_empty() && !edge.right().is_empty());
            assert!(!edge.left().overlaps(edge.right()));
            assert!(edge.original_endpoint(Side::Left).is_subset_of(edge.left()));
            assert!(edge.original_endpoint(Side::Right).is_subset_of(edge.right()));
        }
    }
}
