//! Cypher queries: analytic pattern matches and entity CRUD.

pub mod analytics;
pub mod nodes;
pub mod relations;

use fraudgraph_core::schema::{CheckedProperty, FieldSpec, FieldType};
use fraudgraph_core::{FraudError, FraudResult};
use neo4rs::{BoltType, Query};
use serde::de::DeserializeOwned;

use crate::value::to_bolt;
use crate::GraphClient;

/// Cypher text with its parameters, kept apart until execution so the text
/// can be inspected.
#[derive(Debug, Clone)]
pub(crate) struct Statement {
    text: String,
    params: Vec<(String, BoltType)>,
}

impl Statement {
    pub(crate) fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    pub(crate) fn param(mut self, key: &str, value: impl Into<BoltType>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    pub(crate) fn with_params(mut self, params: Vec<(String, BoltType)>) -> Self {
        self.params.extend(params);
        self
    }

    #[cfg(test)]
    pub(crate) fn text(&self) -> &str {
        &self.text
    }

    #[cfg(test)]
    pub(crate) fn has_param(&self, key: &str) -> bool {
        self.params.iter().any(|(k, _)| k == key)
    }

    pub(crate) fn into_query(self) -> Query {
        self.params
            .into_iter()
            .fold(Query::new(self.text), |q, (k, v)| q.param(&k, v))
    }
}

/// `alias.name = $pN` assignments for checked properties, numbering
/// parameters from `first`.
pub(crate) fn set_clause(alias: &str, props: &[CheckedProperty], first: usize) -> (String, Vec<(String, BoltType)>) {
    let mut assignments = Vec::with_capacity(props.len());
    let mut params = Vec::with_capacity(props.len());
    for (i, p) in props.iter().enumerate() {
        let key = format!("p{}", first + i);
        assignments.push(format!("{}.{} = ${}", alias, p.name, key));
        params.push((key, to_bolt(&p.value)));
    }
    (assignments.join(", "), params)
}

/// Map projection returning every allow-listed property, timestamps as text.
pub(crate) fn projection(alias: &str, key_field: Option<&str>, fields: &[FieldSpec]) -> String {
    let mut entries: Vec<String> = key_field.iter().map(|k| format!(".{}", k)).collect();
    for f in fields {
        match f.ty {
            FieldType::Timestamp => entries.push(format!("{0}: toString({1}.{0})", f.name, alias)),
            _ => entries.push(format!(".{}", f.name)),
        }
    }
    format!("{} {{{}}}", alias, entries.join(", "))
}

/// Run `statement` and decode `field` from every row.
pub(crate) async fn fetch<T: DeserializeOwned>(
    client: &GraphClient,
    operation: &str,
    statement: Statement,
    field: &str,
) -> FraudResult<Vec<T>> {
    client
        .query_column(statement.into_query(), field)
        .await
        .map_err(|e| query_failed(operation, e))
}

/// Convert an adapter failure into the query error class, keeping the chain.
pub(crate) fn query_failed(operation: &str, err: anyhow::Error) -> FraudError {
    tracing::error!(operation, error = ?err, "Neo4j query failed");
    FraudError::query(format!("{}: {:#}", operation, err))
}
