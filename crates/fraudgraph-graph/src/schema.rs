//! Neo4j schema initialization (constraints and indexes).

use anyhow::Result;
use fraudgraph_core::schema::NodeKind;
use neo4rs::Query;
use tracing::info;

use crate::GraphClient;

/// Index statements beyond the per-kind key constraints.
const INDEX_STATEMENTS: &[&str] = &[
    "CREATE INDEX transfer_date IF NOT EXISTS FOR ()-[t:transfers]-() ON (t.transactionDate)",
    "CREATE INDEX customer_risk IF NOT EXISTS FOR (c:Customer) ON (c.isHighRisk)",
];

/// One uniqueness constraint per node kind, on its key property.
pub fn schema_statements() -> Vec<String> {
    NodeKind::ALL
        .iter()
        .map(|kind| {
            format!(
                "CREATE CONSTRAINT {}_key IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
                kind.label().to_lowercase(),
                kind.label(),
                kind.key_field()
            )
        })
        .chain(INDEX_STATEMENTS.iter().map(|s| s.to_string()))
        .collect()
}

/// Initialize Neo4j schema with constraints and indexes.
///
/// Safe to run multiple times - uses IF NOT EXISTS clauses.
pub async fn initialize_schema(client: &GraphClient) -> Result<usize> {
    info!("Initializing Neo4j schema...");

    let statements = schema_statements();
    for statement in &statements {
        client.execute(Query::new(statement.clone())).await?;
    }

    info!("Neo4j schema initialized ({} statements)", statements.len());
    Ok(statements.len())
}
