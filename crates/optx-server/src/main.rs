//! # optx-server: HTTP Diagnostics for Join-Order Search Preparation
//!
//! This binary crate exposes graph simplification and csg-cmp enumeration as a network
//! service, so planners written in other languages can inspect how a join graph would
//! be prepared for join-order search.
//!
//! ## Architecture
//!
//! ```text
//! Client (planner, debug UI)
//!   |
//!   | HTTP POST /join-order/prepare (JSON join graph)
//!   v
//! optx-server (this binary)
//!   |
//!   +-> hypergraph construction (tables -> nodes, joins -> edges)
//!   +-> graph simplification (down to the subgraph limit)
//!   +-> csg-cmp enumeration (under the enumeration budget)
//!   |
//!   | HTTP response (applied steps + search-space summary)
//!   v
//! Client
//! ```
//!
//! ## Endpoints
//!
//! - `GET  /health`                - Health check
//! - `GET  /config`                - Default subgraph limit and enumeration budget
//! - `POST /join-order/prepare`    - Simplify and enumerate a join graph
//!
//! ## Configuration
//!
//! The server listens on `0.0.0.0:3000` by default. Logging is controlled by the
//! `RUST_LOG` environment variable (defaults to `optx=debug`).

mod join_graph;
mod routes;
mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("optx=debug".parse()?))
        .init();

    let state = Arc::new(state::AppState::new());
    let addr = state.config.listen_addr.clone();

    let app = Router::new()
        .route("/health", get(routes::health))
        .route("/config", get(routes::config))
        .route("/join-order/prepare", post(join_graph::prepare_join_graph))
        .layer(CorsLayer::permissive()) // Allow cross-origin requests (for dev/debug UIs)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    tracing::info!("optx-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
