//! # Join-Order Preparation Endpoint
//!
//! A JSON protocol for inspecting join search preparation. The caller sends the join
//! graph of a query:
//!
//! - **Tables**: id, name, row count, and optional per-column NDV statistics
//! - **Joins**: a pair of table ids, a join type, and either an equi-join column pair,
//!   an explicit selectivity, or neither
//!
//! The server builds a hypergraph, simplifies it down to the requested search-space
//! size, enumerates what remains, and reports the steps it took.
//!
//! ## Wire Protocol
//!
//! - Request: `POST /join-order/prepare` with JSON body (`PrepareRequest`)
//! - Response: JSON body (`PrepareResponse`)
//!
//! Steps are reported twice: as table id lists for humans, and as raw relation bit-sets
//! (bit `i` = `tables[i]`) for comparing traces between runs.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use optx_joinorder::enumerator::EnumerationState;
use optx_joinorder::hypergraph::HyperGraph;
use optx_joinorder::prepare::{prepare_join_search, PrepareOutcome};
use optx_joinorder::stats::{equi_join_selectivity, ColumnStatistics, Statistics};
use optx_joinorder::{Bitmap, HyperGraphError, JoinType};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// JSON wire-protocol types
// ---------------------------------------------------------------------------

/// Request body for `POST /join-order/prepare`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    /// Tables participating in the join graph. Their order fixes the bit positions.
    pub tables: Vec<TableInfo>,
    pub joins: Vec<JoinEdge>,
    /// Overrides the server's default simplification target.
    pub subgraph_limit: Option<usize>,
    /// Overrides the server's default enumeration budget.
    pub enumeration_budget: Option<usize>,
}

/// A table in the join graph with its statistics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Unique identifier for this table within the request (e.g., "t0", "t1").
    pub id: String,
    pub name: String,
    pub row_count: f64,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    /// Number of distinct values (NDV).
    pub ndv: f64,
    #[serde(default)]
    pub null_fraction: f64,
}

/// A join predicate between two tables.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinEdge {
    /// ID of the left table (must match a `TableInfo.id`).
    pub left_table_id: String,
    /// ID of the right table (must match a `TableInfo.id`).
    pub right_table_id: String,
    /// Join type (INNER, LEFT, RIGHT, FULL, SEMI, ANTI, CROSS).
    #[serde(default = "default_join_type")]
    pub join_type: String,
    /// Equi-join columns. Used for selectivity when both are present.
    pub left_column: Option<String>,
    pub right_column: Option<String>,
    /// Explicit selectivity in `(0, 1]`; takes precedence over the columns.
    pub selectivity: Option<f64>,
}

fn default_join_type() -> String {
    "INNER".to_string()
}

/// Response body from the preparation endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    pub steps: Vec<StepInfo>,
    /// Whether simplification got the search space down to `subgraphLimit`.
    pub within_limit: bool,
    /// Whether every pair of neighboring joins ended up ordered.
    pub total_order: bool,
    /// csg-cmp pairs handed out by the enumeration pass.
    pub csg_cmp_pairs: usize,
    /// Whether enumeration finished within its budget.
    pub enumeration_complete: bool,
    /// Whether a plan covering every table exists.
    pub complete_plan: bool,
}

/// One applied simplification step.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInfo {
    /// Index into `joins` of the join that now runs first.
    pub before_join: usize,
    /// Index into `joins` of the join whose inputs were rewritten.
    pub after_join: usize,
    pub left_tables: Vec<String>,
    pub right_tables: Vec<String>,
    pub left_bits: u64,
    pub right_bits: u64,
    /// Natural log of the estimated cost of the sub-plan the step commits to.
    pub cost: f64,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /join-order/prepare: simplify and enumerate a join graph.
pub async fn prepare_join_graph(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PrepareRequest>,
) -> Result<Json<PrepareResponse>, (StatusCode, String)> {
    let mut graph = build_hypergraph(&req)?;
    let config = state
        .config
        .prepare_config(req.subgraph_limit, req.enumeration_budget);

    let outcome = prepare_join_search(&mut graph, &config);
    tracing::info!(
        tables = req.tables.len(),
        joins = req.joins.len(),
        steps = outcome.steps.len(),
        pairs = outcome.csg_cmp_pairs,
        "join graph prepared"
    );

    Ok(Json(to_response(&req, &outcome)))
}

// ---------------------------------------------------------------------------
// Hypergraph construction from the join graph
// ---------------------------------------------------------------------------

fn bad_request(e: HyperGraphError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, format!("Invalid join graph: {}", e))
}

/// Build a hypergraph with one node per table, in request order, and one edge per join.
///
/// Selectivity comes from the explicit value if given, then from the NDVs of the join
/// columns, and otherwise from the row counts of the two tables.
fn build_hypergraph(req: &PrepareRequest) -> Result<HyperGraph, (StatusCode, String)> {
    let mut graph = HyperGraph::new();
    let mut table_index: HashMap<&str, usize> = HashMap::new();

    for table in &req.tables {
        let mut stats = Statistics::new(table.row_count);
        for col in &table.columns {
            stats = stats.with_column(
                col.name.clone(),
                ColumnStatistics::new(col.ndv, col.null_fraction),
            );
        }
        let index = graph.add_node(table.name.clone(), stats).map_err(bad_request)?;
        if table_index.insert(table.id.as_str(), index).is_some() {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Duplicate table ID: {}", table.id),
            ));
        }
    }

    let lookup = |id: &str| {
        table_index.get(id).copied().ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("Unknown table ID: {}", id),
            )
        })
    };

    for join in &req.joins {
        let left = lookup(&join.left_table_id)?;
        let right = lookup(&join.right_table_id)?;
        let join_type = parse_join_type(&join.join_type);
        let (left_set, right_set) = (Bitmap::singleton(left), Bitmap::singleton(right));

        let selectivity = match (&join.selectivity, &join.left_column, &join.right_column) {
            (Some(sel), _, _) => Some(*sel),
            (None, Some(lc), Some(rc)) if join_type != JoinType::Cross => {
                Some(equi_join_selectivity(
                    &graph.node(left).stats,
                    &graph.node(right).stats,
                    &[(lc.clone(), rc.clone())],
                ))
            }
            _ => None,
        };

        match selectivity {
            Some(sel) => graph.add_edge_with_selectivity(join_type, left_set, right_set, sel),
            None => graph.add_edge(join_type, left_set, right_set),
        }
        .map_err(bad_request)?;
    }

    Ok(graph)
}

/// Parse a join type string into the library enum. Unknown strings are inner joins.
fn parse_join_type(s: &str) -> JoinType {
    match s.to_uppercase().as_str() {
        "INNER" => JoinType::Inner,
        "LEFT" => JoinType::Left,
        "RIGHT" => JoinType::Right,
        "FULL" => JoinType::Full,
        "SEMI" => JoinType::Semi,
        "ANTI" => JoinType::Anti,
        "CROSS" => JoinType::Cross,
        _ => JoinType::Inner,
    }
}

// ---------------------------------------------------------------------------
// Outcome → response conversion
// ---------------------------------------------------------------------------

fn table_ids(req: &PrepareRequest, set: Bitmap) -> Vec<String> {
    set.iter().map(|i| req.tables[i].id.clone()).collect()
}

fn to_response(req: &PrepareRequest, outcome: &PrepareOutcome) -> PrepareResponse {
    let steps = outcome
        .steps
        .iter()
        .map(|step| StepInfo {
            before_join: step.before_edge,
            after_join: step.after_edge,
            left_tables: table_ids(req, step.left),
            right_tables: table_ids(req, step.right),
            left_bits: step.left.bits(),
            right_bits: step.right.bits(),
            cost: step.cost,
        })
        .collect();

    PrepareResponse {
        steps,
        within_limit: outcome.within_limit,
        total_order: outcome.total_order,
        csg_cmp_pairs: outcome.csg_cmp_pairs,
        enumeration_complete: outcome.enumeration_state == EnumerationState::Done,
        complete_plan: outcome.complete_plan,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::OptimizerConfig;

    fn table(id: &str, rows: f64) -> TableInfo {
        TableInfo {
            id: id.to_string(),
            name: format!("{}_table", id),
            row_count: rows,
            columns: vec![],
        }
    }

    fn join(left: &str, right: &str) -> JoinEdge {
        JoinEdge {
            left_table_id: left.to_string(),
            right_table_id: right.to_string(),
            join_type: default_join_type(),
            left_column: None,
            right_column: None,
            selectivity: None,
        }
    }

    fn star_request() -> PrepareRequest {
        PrepareRequest {
            tables: vec![
                table("t0", 10.0),
                table("t1", 20.0),
                table("t2", 30.0),
                table("t3", 40.0),
                table("t4", 50.0),
            ],
            joins: vec![join("t0", "t1"), join("t0", "t2"), join("t0", "t3"), join("t0", "t4")],
            subgraph_limit: Some(0),
            enumeration_budget: None,
        }
    }

    #[test]
    fn test_parse_join_type() {
        assert_eq!(parse_join_type("INNER"), JoinType::Inner);
        assert_eq!(parse_join_type("inner"), JoinType::Inner);
        assert_eq!(parse_join_type("LEFT"), JoinType::Left);
        assert_eq!(parse_join_type("RIGHT"), JoinType::Right);
        assert_eq!(parse_join_type("FULL"), JoinType::Full);
        assert_eq!(parse_join_type("cross"), JoinType::Cross);
        assert_eq!(parse_join_type("unknown"), JoinType::Inner);
    }

    #[test]
    fn test_build_hypergraph_uses_column_ndv() {
        let mut req = star_request();
        req.tables[0].columns.push(ColumnInfo {
            name: "k".to_string(),
            ndv: 8.0,
            null_fraction: 0.0,
        });
        req.joins[0].left_column = Some("k".to_string());
        req.joins[0].right_column = Some("k".to_string());
        req.joins[1].selectivity = Some(0.25);

        let graph = build_hypergraph(&req).unwrap();
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4);
        // t1 has no stats for `k`, so its row count stands in for the NDV.
        assert!((graph.edge(0).selectivity - 1.0 / 20.0).abs() < 1e-12);
        assert_eq!(graph.edge(1).selectivity, 0.25);
        assert!((graph.edge(2).selectivity - 1.0 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_table_is_bad_request() {
        let mut req = star_request();
        req.joins.push(join("t0", "t9"));
        let (status, message) = build_hypergraph(&req).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("t9"));
    }

    #[test]
    fn test_self_join_is_bad_request() {
        let mut req = star_request();
        req.joins.push(join("t2", "t2"));
        let (status, _) = build_hypergraph(&req).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_invalid_selectivity_is_bad_request() {
        let mut req = star_request();
        req.joins[3].selectivity = Some(1.5);
        let (status, message) = build_hypergraph(&req).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("1.5"));
    }

    #[test]
    fn test_duplicate_table_id_is_bad_request() {
        let mut req = star_request();
        req.tables.push(table("t1", 5.0));
        assert!(build_hypergraph(&req).is_err());
    }

    #[test]
    fn test_star_response_lists_tables() {
        let req = star_request();
        let mut graph = build_hypergraph(&req).unwrap();
        let config = OptimizerConfig::default().prepare_config(req.subgraph_limit, None);
        let outcome = prepare_join_search(&mut graph, &config);
        let response = to_response(&req, &outcome);

        assert_eq!(response.steps.len(), 6);
        let first = &response.steps[0];
        assert_eq!((first.left_bits, first.right_bits), (17, 2));
        assert_eq!(first.left_tables, vec!["t0", "t4"]);
        assert_eq!(first.right_tables, vec!["t1"]);
        assert!(response.total_order);
        assert!(response.enumeration_complete);
        assert!(response.complete_plan);
        assert_eq!(response.csg_cmp_pairs, 4);

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["steps"][0]["leftBits"], 17);
        assert_eq!(json["csgCmpPairs"], 4);
    }
}
