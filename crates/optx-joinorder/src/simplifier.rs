//! # Graph Simplification
//!
//! Exhaustive join enumeration is exponential in the number of relations. Before the
//! search runs, the simplifier shrinks the search space by fixing the relative order of
//! joins, one pair at a time, greedily picking the ordering that looks cheapest. This
//! follows Neumann & Radke, "Adaptive Optimization of Very Large Join Queries".
//!
//! ## Steps
//!
//! Take two neighboring join edges `e1 = (A, B)` and `e2 = (C, D)` whose sides `A` and
//! `C` are nested (one contains the other). Forcing `e1` to be evaluated before `e2`
//! means `e2` can no longer join `C` alone: its side becomes the merged group
//! `X = A ∪ C ∪ B`. That rewrite is one [`SimplificationStep`], recorded as the new
//! `(left, right)` of `e2`. Relations inside `X` now reach `D` only as a unit, which cuts
//! every plan that would join part of `X` with `D` first.
//!
//! A step is only legal if `A ∪ C`, `B` and `D` are pairwise disjoint and the join kind
//! of `e2` allows its side to grow (see
//! [`JoinType::allows_growth`](crate::hypergraph::JoinType::allows_growth)).
//!
//! ## Dependencies
//!
//! Each edge side remembers the edges that must be evaluated inside it. When an edge
//! grows, every side depending on it grows too, so orderings fixed by earlier steps stay
//! satisfiable. Sides are recomputed to a fixpoint:
//!
//! ```text
//! side(e, s) = base(e, s) ∪ ⋃ { left(d) ∪ right(d) | d ∈ deps(e, s) }
//! ```
//!
//! A step whose fixpoint leaves any edge with overlapping sides would make the graph
//! unjoinable and is rejected.
//!
//! ## Ranking
//!
//! A step commits to a three-relation-group sub-plan: `(A ∪ C) ⋈ B`, then `X ⋈ D`. Its
//! score is the cost of that sub-plan under the [`CostModel`], using the cheapest known
//! cost of each group as input. Lower is better; ties go to the larger merged group, then
//! the smaller deferred side, then the lower rewritten edge, then the lower first edge.
//!
//! ## Lazy Invalidation
//!
//! Candidates carry the generation of both edges at the time they were scored. Every
//! rewrite bumps the generation of each edge it touches, and stale candidates are
//! dropped when popped instead of being searched for and removed. Candidates for every
//! changed edge are then rescored against all other edges.
//!
//! ## Bounded Simplification
//!
//! [`GraphSimplifier::simplify_graph`] applies steps until a budgeted enumeration fits
//! under the limit. It probes with exponentially growing batches of steps, then
//! binary-searches back over the applied steps (undoing and redoing them) so the graph
//! keeps as many join orders as the limit allows.

use crate::bitmap::Bitmap;
use crate::cost::{Cost, CostModel, DefaultCostModel};
use crate::enumerator::SubgraphEnumerator;
use crate::hypergraph::{Edge, HyperGraph, Side};
use crate::receiver::Counter;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

/// One applied ordering: `before_edge` is now evaluated before `after_edge`, whose sides
/// became `left` and `right`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplificationStep {
    pub before_edge: usize,
    pub after_edge: usize,
    pub left: Bitmap,
    pub right: Bitmap,
    /// `ln` of the estimated cost of the sub-plan this step commits to.
    pub cost: f64,
}

impl SimplificationStep {
    /// The rewritten sides as raw bitmaps.
    pub fn as_bits(&self) -> (u64, u64) {
        (self.left.bits(), self.right.bits())
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    rank: OrderedFloat<f64>,
    merged: Bitmap,
    deferred: Bitmap,
    before: usize,
    after: usize,
    before_generation: u64,
    after_generation: u64,
    /// Side of `after` replaced by `merged`.
    side: Side,
    merged_cost: Cost,
    total_cost: Cost,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank
            .cmp(&other.rank)
            .then_with(|| other.merged.cmp(&self.merged))
            .then_with(|| self.deferred.cmp(&other.deferred))
            .then_with(|| self.after.cmp(&other.after))
            .then_with(|| self.before.cmp(&other.before))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

#[derive(Debug, Clone, Copy)]
struct EdgeChange {
    edge: usize,
    previous: (Bitmap, Bitmap),
    current: (Bitmap, Bitmap),
    /// Generation before the change. The change itself bumps it by one.
    generation: u64,
}

/// Everything needed to undo or redo one step.
#[derive(Debug, Clone)]
struct AppliedStep {
    step: SimplificationStep,
    changes: Vec<EdgeChange>,
    dependency_side: Side,
    dependencies: (Bitmap, Bitmap),
    merged: Bitmap,
    merged_costs: (Option<Cost>, Cost),
}

/// Greedy join-order simplifier over a mutable [`HyperGraph`].
pub struct GraphSimplifier<'g> {
    graph: &'g mut HyperGraph,
    cost_model: Arc<dyn CostModel>,
    queue: BinaryHeap<Reverse<Candidate>>,
    generations: Vec<u64>,
    /// Edge sides at construction; fixpoints only ever grow from here.
    base: Vec<[Bitmap; 2]>,
    /// `dependencies[e][s]`: edges that must be evaluated inside side `s` of `e`.
    dependencies: Vec<[Bitmap; 2]>,
    /// Cheapest known cost per merged group.
    group_costs: HashMap<Bitmap, Cost>,
    applied: Vec<AppliedStep>,
    undone: Vec<AppliedStep>,
    last_applied: Option<SimplificationStep>,
}

/// First pair of nested sides of two edges, tried left/left, left/right, right/left,
/// right/right.
fn shared_sides(a: &Edge, b: &Edge) -> Option<(Side, Side)> {
    for sa in Side::BOTH {
        for sb in Side::BOTH {
            if a.endpoint(sa).is_nested_with(b.endpoint(sb)) {
                return Some((sa, sb));
            }
        }
    }
    None
}

/// `(A ∪ C, B, D)` if evaluating `before` first is locally legal.
fn local_ordering(
    graph: &HyperGraph,
    before: usize,
    before_side: Side,
    after: usize,
    after_side: Side,
) -> Option<(Bitmap, Bitmap, Bitmap)> {
    let (first, second) = (graph.edge(before), graph.edge(after));
    if !second.join_type.allows_growth(after_side) {
        return None;
    }
    let common = first.endpoint(before_side) | second.endpoint(after_side);
    let b = first.endpoint(before_side.other());
    let d = second.endpoint(after_side.other());
    if common.overlaps(b) || common.overlaps(d) || b.overlaps(d) {
        return None;
    }
    Some((common, b, d))
}

impl<'g> GraphSimplifier<'g> {
    pub fn new(graph: &'g mut HyperGraph) -> Self {
        Self::with_cost_model(graph, Arc::new(DefaultCostModel))
    }

    pub fn with_cost_model(graph: &'g mut HyperGraph, cost_model: Arc<dyn CostModel>) -> Self {
        let edge_count = graph.edge_count();
        let base: Vec<[Bitmap; 2]> = graph
            .edges()
            .iter()
            .map(|e| [e.left(), e.right()])
            .collect();

        // An edge lying entirely inside another edge's side already has to be
        // evaluated there.
        let mut dependencies = vec![[Bitmap::EMPTY; 2]; edge_count];
        for (j, deps) in dependencies.iter_mut().enumerate() {
            for i in (0..edge_count).filter(|&i| i != j) {
                let nodes = graph.edge(i).nodes();
                for side in Side::BOTH {
                    if nodes.is_subset_of(base[j][side.index()]) {
                        deps[side.index()].insert(i);
                    }
                }
            }
        }

        let mut simplifier = Self {
            graph,
            cost_model,
            queue: BinaryHeap::new(),
            generations: vec![0; edge_count],
            base,
            dependencies,
            group_costs: HashMap::new(),
            applied: Vec::new(),
            undone: Vec::new(),
            last_applied: None,
        };
        for i in 0..edge_count {
            for j in i + 1..edge_count {
                simplifier.push_candidates(i, j);
            }
        }
        debug!(
            nodes = simplifier.graph.node_count(),
            edges = edge_count,
            candidates = simplifier.queue.len(),
            "graph simplifier initialized"
        );
        simplifier
    }

    pub fn graph(&self) -> &HyperGraph {
        &*self.graph
    }

    /// The applied steps, oldest first.
    pub fn steps(&self) -> Vec<SimplificationStep> {
        self.applied.iter().map(|a| a.step).collect()
    }

    pub fn step_count(&self) -> usize {
        self.applied.len()
    }

    /// The step applied by the most recent successful call to
    /// [`apply_simplification_step`](Self::apply_simplification_step).
    ///
    /// `None` before the first step and after a call that applied nothing. After a
    /// rollback this is the step now last in the trace.
    pub fn last_applied_step(&self) -> Option<SimplificationStep> {
        self.last_applied
    }

    /// Apply the best remaining step. Returns `false` once no legal step is left.
    ///
    /// Steps undone by a rollback are redone first, in order.
    pub fn apply_simplification_step(&mut self) -> bool {
        if let Some(applied) = self.undone.pop() {
            self.replay(&applied);
            self.last_applied = Some(applied.step);
            self.applied.push(applied);
            return true;
        }

        while let Some(Reverse(candidate)) = self.queue.pop() {
            if candidate.before_generation != self.generations[candidate.before]
                || candidate.after_generation != self.generations[candidate.after]
            {
                continue;
            }
            let Some((sides, dependencies)) =
                self.propagate_with(candidate.before, candidate.after, candidate.side)
            else {
                trace!(
                    before = candidate.before,
                    after = candidate.after,
                    "ordering rejected: dependent edge would overlap"
                );
                continue;
            };
            self.commit(candidate, &sides, dependencies);
            return true;
        }

        self.last_applied = None;
        false
    }

    /// Undo the most recent step. Returns `false` if nothing is applied.
    pub fn rollback_step(&mut self) -> bool {
        let Some(applied) = self.applied.pop() else {
            return false;
        };
        self.rewind(&applied);
        self.undone.push(applied);
        self.last_applied = self.applied.last().map(|a| a.step);
        true
    }

    /// True if no two edges are left whose relative order could still be fixed.
    ///
    /// Edges with nested relation sets are already ordered. Edges that share no nested
    /// side, that straddle each other so that neither can go first, or whose ordering
    /// would break an earlier one through its dependents, have nothing left to decide.
    pub fn is_total_order(&self) -> bool {
        let edge_count = self.graph.edge_count();
        let live: Vec<usize> = (0..edge_count)
            .filter(|&i| self.graph.absorbed_into(i).is_none())
            .collect();
        for (n, &i) in live.iter().enumerate() {
            for &j in &live[n + 1..] {
                let (ei, ej) = (self.graph.edge(i), self.graph.edge(j));
                if ei.nodes().is_nested_with(ej.nodes()) {
                    continue;
                }
                let Some((si, sj)) = shared_sides(ei, ej) else {
                    continue;
                };
                if self.can_order(i, si, j, sj) || self.can_order(j, sj, i, si) {
                    return false;
                }
            }
        }
        true
    }

    /// Apply the fewest steps that bring the csg-cmp pair count to at most `limit`.
    ///
    /// Returns `true` when the graph ends within the limit and `false` when every legal
    /// step is applied and the graph is still too large.
    pub fn simplify_graph(&mut self, limit: usize) -> bool {
        debug!(limit, applied = self.applied.len(), "simplifying join graph");
        if self.is_within(limit) {
            return true;
        }

        // `over` steps are known to exceed the limit.
        let mut over = self.applied.len();
        let mut batch = 1usize;
        let mut under = loop {
            let mut exhausted = false;
            for _ in 0..batch {
                if !self.apply_simplification_step() {
                    exhausted = true;
                    break;
                }
            }
            if self.is_within(limit) {
                break self.applied.len();
            }
            if exhausted {
                debug!(
                    limit,
                    steps = self.applied.len(),
                    "simplification exhausted above limit"
                );
                return false;
            }
            over = self.applied.len();
            batch *= 2;
        };

        // The graph sits at `under` steps between iterations.
        while under - over > 1 {
            let mid = over + (under - over) / 2;
            self.rollback_to(mid);
            if self.is_within(limit) {
                under = mid;
            } else {
                over = mid;
                self.redo_to(under);
            }
        }

        debug!(limit, steps = under, "join graph within limit");
        true
    }

    /// Whether `before` could still be forced below side `after_side` of `after`.
    ///
    /// Same test a queued candidate passes when popped. Dependencies only grow, so a
    /// pair that fails here stays blocked.
    fn can_order(
        &self,
        before: usize,
        before_side: Side,
        after: usize,
        after_side: Side,
    ) -> bool {
        local_ordering(&*self.graph, before, before_side, after, after_side).is_some()
            && self.propagate_with(before, after, after_side).is_some()
    }

    /// Whether a full enumeration emits at most `limit` pairs.
    fn is_within(&self, limit: usize) -> bool {
        let mut counter = Counter::with_limit(limit);
        SubgraphEnumerator::new(&*self.graph, &mut counter).enumerate()
    }

    fn rollback_to(&mut self, steps: usize) {
        while self.applied.len() > steps && self.rollback_step() {}
    }

    fn redo_to(&mut self, steps: usize) {
        while self.applied.len() < steps && !self.undone.is_empty() {
            self.apply_simplification_step();
        }
    }

    fn group_cost(&self, group: Bitmap) -> Cost {
        self.group_costs
            .get(&group)
            .copied()
            .unwrap_or_else(|| self.cost_model.fallback_cost(&*self.graph, group))
    }

    fn push_candidates(&mut self, i: usize, j: usize) {
        let (ei, ej) = (self.graph.edge(i), self.graph.edge(j));
        if ei.nodes().is_nested_with(ej.nodes()) {
            return;
        }
        let Some((si, sj)) = shared_sides(ei, ej) else {
            return;
        };
        for (before, before_side, after, after_side) in [(i, si, j, sj), (j, sj, i, si)] {
            if let Some(candidate) = self.score(before, before_side, after, after_side) {
                self.queue.push(Reverse(candidate));
            }
        }
    }

    fn score(
        &self,
        before: usize,
        before_side: Side,
        after: usize,
        after_side: Side,
    ) -> Option<Candidate> {
        let (common, b, d) =
            local_ordering(&*self.graph, before, before_side, after, after_side)?;
        self.propagate_with(before, after, after_side)?;

        let merged = common | b;
        let merged_cost = self.cost_model.join_cost(
            &*self.graph,
            self.group_cost(common),
            self.group_cost(b),
            merged,
        );
        let total_cost =
            self.cost_model
                .join_cost(&*self.graph, merged_cost, self.group_cost(d), merged | d);
        Some(Candidate {
            rank: total_cost.rank(),
            merged,
            deferred: d,
            before,
            after,
            before_generation: self.generations[before],
            after_generation: self.generations[after],
            side: after_side,
            merged_cost,
            total_cost,
        })
    }

    /// Edge sides after forcing `before` into side `side` of `after`, or `None` if some
    /// edge would end up with overlapping sides.
    #[allow(clippy::type_complexity)]
    fn propagate_with(
        &self,
        before: usize,
        after: usize,
        side: Side,
    ) -> Option<(Vec<[Bitmap; 2]>, Vec<[Bitmap; 2]>)> {
        let mut dependencies = self.dependencies.clone();
        dependencies[after][side.index()].insert(before);

        let mut sides = self.base.clone();
        loop {
            let mut changed = false;
            for edge in 0..sides.len() {
                for s in 0..2 {
                    let grown = dependencies[edge][s]
                        .iter()
                        .fold(self.base[edge][s], |acc, d| acc | sides[d][0] | sides[d][1]);
                    if grown != sides[edge][s] {
                        sides[edge][s] = grown;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        if sides.iter().any(|s| s[0].overlaps(s[1])) {
            return None;
        }
        Some((sides, dependencies))
    }

    fn commit(
        &mut self,
        candidate: Candidate,
        sides: &[[Bitmap; 2]],
        dependencies: Vec<[Bitmap; 2]>,
    ) {
        let changes: Vec<EdgeChange> = self
            .graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(i, e)| (e.left(), e.right()) != (sides[*i][0], sides[*i][1]))
            .map(|(i, e)| EdgeChange {
                edge: i,
                previous: (e.left(), e.right()),
                current: (sides[i][0], sides[i][1]),
                generation: self.generations[i],
            })
            .collect();

        let side = candidate.side.index();
        let previous_cost = self.group_costs.get(&candidate.merged).copied();
        let cached_cost = match previous_cost {
            Some(cost) if cost <= candidate.merged_cost => cost,
            _ => candidate.merged_cost,
        };
        let [left, right] = sides[candidate.after];
        let applied = AppliedStep {
            step: SimplificationStep {
                before_edge: candidate.before,
                after_edge: candidate.after,
                left,
                right,
                cost: candidate.total_cost.ln_total,
            },
            changes,
            dependency_side: candidate.side,
            dependencies: (
                self.dependencies[candidate.after][side],
                dependencies[candidate.after][side],
            ),
            merged: candidate.merged,
            merged_costs: (previous_cost, cached_cost),
        };

        self.replay(&applied);
        trace!(
            before = candidate.before,
            after = candidate.after,
            left = %left,
            right = %right,
            changed = applied.changes.len(),
            cost = candidate.total_cost.ln_total,
            "simplification step applied"
        );

        for change in &applied.changes {
            for other in (0..self.graph.edge_count()).filter(|&k| k != change.edge) {
                self.push_candidates(other.min(change.edge), other.max(change.edge));
            }
        }
        self.last_applied = Some(applied.step);
        self.applied.push(applied);
    }

    fn replay(&mut self, applied: &AppliedStep) {
        for change in &applied.changes {
            self.graph
                .set_endpoints(change.edge, change.current.0, change.current.1);
            self.generations[change.edge] = change.generation + 1;
        }
        let after = applied.step.after_edge;
        self.dependencies[after][applied.dependency_side.index()] = applied.dependencies.1;
        self.group_costs.insert(applied.merged, applied.merged_costs.1);
    }

    fn rewind(&mut self, applied: &AppliedStep) {
        for change in applied.changes.iter().rev() {
            self.graph
                .set_endpoints(change.edge, change.previous.0, change.previous.1);
            self.generations[change.edge] = change.generation;
        }
        let after = applied.step.after_edge;
        self.dependencies[after][applied.dependency_side.index()] = applied.dependencies.0;
        match applied.merged_costs.0 {
            Some(cost) => {
                self.group_costs.insert(applied.merged, cost);
            }
            None => {
                self.group_costs.remove(&applied.merged);
            }
        }
    }
}
