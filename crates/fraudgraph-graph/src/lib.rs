//! # FraudGraph Graph
//!
//! Neo4j integration for FraudGraph.
//!
//! Provides the connection client, schema bootstrap, the analytic
//! [`GraphStore`](fraudgraph_core::store::GraphStore) implementation and
//! allow-listed entity CRUD.

pub mod client;
pub mod queries;
pub mod schema;
mod value;

pub use client::{GraphClient, GraphConfig, GraphCounts};
pub use queries::analytics::Neo4jStore;
pub use schema::initialize_schema;
