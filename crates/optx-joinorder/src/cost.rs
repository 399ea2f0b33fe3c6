//! # Cost Model
//!
//! The simplifier ranks candidate orderings by the cost of the small sub-plan each one
//! commits to. Costs follow C_out: the cost of a plan is the sum of the estimated sizes
//! of every intermediate result it produces.
//!
//! ```text
//! cost(scan)     = 0
//! cost(A ⋈ B)    = cost(A) + cost(B) + |A ⋈ B|
//! ```
//!
//! ## Log Space
//!
//! Intermediate sizes of 64 relations overflow any fixed-width integer and most of the
//! `f64` range. `Cost` therefore stores the natural log of the cost and adds in log
//! space (`ln(e^a + e^b)`). Zero cost is `-inf`.
//!
//! ## Pluggable Design
//!
//! `CostModel` lets a caller replace C_out with something that knows about physical
//! operators. The simplifier only needs a total order over candidates.

use crate::bitmap::Bitmap;
use crate::hypergraph::HyperGraph;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Candidate costs are compared after rounding to this many units per log unit.
const RANK_SCALE: f64 = 1e6;

/// A non-negative cost, stored as its natural logarithm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    /// `ln(cost)`. `-inf` is zero cost.
    pub ln_total: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self {
            ln_total: f64::NEG_INFINITY,
        }
    }

    pub fn from_ln(ln_total: f64) -> Self {
        Self { ln_total }
    }

    pub fn is_zero(&self) -> bool {
        self.ln_total == f64::NEG_INFINITY
    }

    /// The cost as a plain number. Saturates to `inf` for huge plans.
    pub fn value(&self) -> f64 {
        self.ln_total.exp()
    }

    /// Sum of `parts`, computed without leaving log space.
    pub fn sum(parts: &[Cost]) -> Cost {
        let max = parts
            .iter()
            .map(|c| c.ln_total)
            .fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return Cost::zero();
        }
        let scaled: f64 = parts.iter().map(|c| (c.ln_total - max).exp()).sum();
        Cost::from_ln(max + scaled.ln())
    }

    /// Rounded sort key. Two costs within rounding distance rank as equal, so ties are
    /// decided by the caller's structural tie-breakers rather than by float noise.
    pub fn rank(&self) -> OrderedFloat<f64> {
        OrderedFloat((self.ln_total * RANK_SCALE).round())
    }
}

/// Epsilon-based equality to handle floating-point imprecision in cost comparisons.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.ln_total == other.ln_total || (self.ln_total - other.ln_total).abs() < 1e-12
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.ln_total.partial_cmp(&other.ln_total)
    }
}

/// Trait for pluggable cost models.
pub trait CostModel: Send + Sync {
    /// Cost of joining two already-costed inputs whose union is `output`.
    fn join_cost(&self, graph: &HyperGraph, left: Cost, right: Cost, output: Bitmap) -> Cost;

    /// Cost assumed for a set of relations no step has costed yet.
    ///
    /// Base relations are free. A larger uncosted set is charged its own output size,
    /// which is a lower bound for any plan that produces it.
    fn fallback_cost(&self, graph: &HyperGraph, set: Bitmap) -> Cost {
        if set.len() <= 1 {
            Cost::zero()
        } else {
            Cost::from_ln(graph.estimate_rows_ln(set))
        }
    }
}

/// C_out: every join costs its inputs plus its own estimated output size.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCostModel;

impl CostModel for DefaultCostModel {
    fn join_cost(&self, graph: &HyperGraph, left: Cost, right: Cost, output: Bitmap) -> Cost {
        let output_rows = Cost::from_ln(graph.estimate_rows_ln(output));
        Cost::sum(&[left, right, output_rows])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_in_log_space() {
        let c = Cost::sum(&[Cost::from_ln(2f64.ln()), Cost::from_ln(3f64.ln())]);
        assert!((c.value() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_is_identity() {
        let c = Cost::from_ln(7f64.ln());
        assert_eq!(Cost::sum(&[Cost::zero(), c]), c);
        assert!(Cost::sum(&[Cost::zero(), Cost::zero()]).is_zero());
        assert!(Cost::sum(&[]).is_zero());
    }

    #[test]
    fn test_huge_costs_stay_finite() {
        let huge = Cost::from_ln(5000.0);
        let total = Cost::sum(&[huge, huge]);
        assert!(total.ln_total.is_finite());
        assert!((total.ln_total - (5000.0 + 2f64.ln())).abs() < 1e-9);
        assert!(total > huge);
    }

    #[test]
    fn test_rank_absorbs_float_noise() {
        let a = Cost::from_ln(3.0);
        let b = Cost::from_ln(3.0 + 1e-12);
        assert_eq!(a.rank(), b.rank());
        assert!(Cost::zero().rank() < a.rank());
    }
}
