//! # Application State
//!
//! Shared state available to every request handler. It is created once at startup and
//! shared via `Arc` across concurrent requests.
//!
//! Each request builds and simplifies its own hypergraph, so the only shared piece is
//! the default configuration.

use optx_joinorder::prepare::PrepareConfig;
use serde::Serialize;

/// Server-level defaults for join search preparation.
///
/// Requests may override `subgraph_limit` and `enumeration_budget` individually.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizerConfig {
    /// Target number of csg-cmp pairs after simplification.
    pub subgraph_limit: usize,
    /// Maximum pairs handed out by the enumeration pass.
    pub enumeration_budget: usize,
    /// Socket address the server binds to.
    pub listen_addr: String,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let prepare = PrepareConfig::default();
        Self {
            subgraph_limit: prepare.subgraph_limit,
            enumeration_budget: prepare.enumeration_budget,
            listen_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl OptimizerConfig {
    /// The preparation knobs, with per-request overrides applied.
    pub fn prepare_config(
        &self,
        subgraph_limit: Option<usize>,
        enumeration_budget: Option<usize>,
    ) -> PrepareConfig {
        PrepareConfig {
            subgraph_limit: subgraph_limit.unwrap_or(self.subgraph_limit),
            enumeration_budget: enumeration_budget.unwrap_or(self.enumeration_budget),
        }
    }
}

/// Shared application state, accessible by all request handlers via Axum's State extractor.
pub struct AppState {
    pub config: OptimizerConfig,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            config: OptimizerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_only_given_knobs() {
        let config = OptimizerConfig::default();
        let prepare = config.prepare_config(Some(50), None);
        assert_eq!(prepare.subgraph_limit, 50);
        assert_eq!(prepare.enumeration_budget, config.enumeration_budget);
    }
}
