//! Application state.

use fraudgraph_core::analytics::Analytics;
use fraudgraph_graph::GraphClient;
use std::sync::Arc;

use crate::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub analytics: Arc<Analytics>,
    /// Neo4j handle for entity CRUD; `None` when serving a snapshot.
    pub graph: Option<GraphClient>,
}

impl AppState {
    pub fn new(analytics: Arc<Analytics>, graph: Option<GraphClient>) -> Self {
        Self { analytics, graph }
    }

    pub fn graph(&self) -> Result<&GraphClient, ApiError> {
        self.graph.as_ref().ok_or_else(ApiError::graph_unavailable)
    }
}
