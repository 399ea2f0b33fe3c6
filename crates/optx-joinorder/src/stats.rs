//! # Relation Statistics
//!
//! Statistics are supplied by the caller when a relation is added to the join graph and
//! are only ever read here. They feed two things:
//!
//! - **Row counts** of base relations, the starting point of every cardinality estimate.
//! - **Default join selectivity** for predicates added without an explicit estimate.
//!
//! ## Join Selectivity
//!
//! The standard equi-join formula under the containment assumption:
//!
//! ```text
//! sel(A.x = B.y) = 1 / max(NDV(A.x), NDV(B.y))
//! ```
//!
//! Multi-column predicates multiply per-column selectivities (independence assumption).
//! When NDV information is unavailable the relation's row count stands in for it, so a
//! predicate without column information reduces to `1 / max(|A|, |B|)`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics for one base relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub column_stats: HashMap<String, ColumnStatistics>,
}

impl Statistics {
    pub fn new(row_count: f64) -> Self {
        Self {
            row_count,
            column_stats: HashMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, stats: ColumnStatistics) -> Self {
        self.column_stats.insert(name.into(), stats);
        self
    }

    /// Row count clamped to at least one row, so its logarithm is never negative.
    pub fn effective_rows(&self) -> f64 {
        self.row_count.max(1.0)
    }

    /// NDV of `column`, falling back to the row count when unknown.
    pub fn distinct_count(&self, column: &str) -> f64 {
        self.column_stats
            .get(column)
            .map(|s| s.distinct_count)
            .unwrap_or(self.row_count)
    }
}

/// Per-column statistics used for selectivity estimation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values (NDV).
    pub distinct_count: f64,
    /// Fraction of rows that are NULL [0.0, 1.0].
    pub null_fraction: f64,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
        }
    }
}

/// Selectivity of an equi-join between `left` and `right` on the given column pairs.
///
/// With no column pairs this is the key-less estimate `1 / max(|left|, |right|)`, which
/// treats the predicate as a join on a key of the larger relation.
pub fn equi_join_selectivity(
    left: &Statistics,
    right: &Statistics,
    join_columns: &[(String, String)],
) -> f64 {
    if join_columns.is_empty() {
        return 1.0 / left.row_count.max(right.row_count).max(1.0);
    }

    let mut selectivity = 1.0_f64;
    for (left_col, right_col) in join_columns {
        let left_ndv = left.distinct_count(left_col);
        let right_ndv = right.distinct_count(right_col);
        let max_ndv = left_ndv.max(right_ndv).max(1.0);
        selectivity /= max_ndv;
    }
    selectivity
}
