//! Node CRUD for the allow-listed node kinds.
//!
//! Labels, key names and property names are taken from the schema tables
//! only; every value is bound as a parameter.

use chrono::{SecondsFormat, Utc};
use fraudgraph_core::schema::{
    check_properties, check_removals, CheckMode, CheckedProperty, NodeKind, Properties, PropertyValue,
};
use fraudgraph_core::{FraudError, FraudResult};
use serde_json::Value;
use uuid::Uuid;

use super::{fetch, projection, set_clause, Statement};
use crate::GraphClient;

fn node_projection(kind: NodeKind) -> String {
    projection("n", Some(kind.key_field()), kind.fields())
}

fn match_by_key(kind: NodeKind) -> String {
    format!("MATCH (n:{} {{{}: $key}})", kind.label(), kind.key_field())
}

/// Split the caller's key out of a create body, generating one when absent.
pub(crate) fn take_key(kind: NodeKind, props: &mut Properties) -> FraudResult<String> {
    match props.remove(kind.key_field()) {
        None => Ok(Uuid::new_v4().to_string()),
        Some(PropertyValue::Text(key)) if !key.trim().is_empty() => Ok(key),
        Some(_) => Err(FraudError::validation(format!(
            "'{}' must be a non-empty string",
            kind.key_field()
        ))),
    }
}

pub(crate) fn exists_statement(kind: NodeKind, key: &str) -> Statement {
    Statement::new(format!("{} RETURN count(n) AS count", match_by_key(kind))).param("key", key)
}

pub(crate) fn create_statement(kind: NodeKind, key: &str, props: &[CheckedProperty]) -> Statement {
    let (assignments, params) = set_clause("n", props, 0);
    let set = if assignments.is_empty() {
        String::new()
    } else {
        format!(" SET {}", assignments)
    };
    Statement::new(format!(
        "CREATE (n:{} {{{}: $key}}){} RETURN {} AS node",
        kind.label(),
        kind.key_field(),
        set,
        node_projection(kind)
    ))
    .param("key", key)
    .with_params(params)
}

pub(crate) fn list_statement(kind: NodeKind, limit: usize) -> Statement {
    Statement::new(format!(
        "MATCH (n:{}) RETURN {} AS node ORDER BY n.{} LIMIT $limit",
        kind.label(),
        node_projection(kind),
        kind.key_field()
    ))
    .param("limit", limit as i64)
}

pub(crate) fn get_statement(kind: NodeKind, key: &str) -> Statement {
    Statement::new(format!("{} RETURN {} AS node", match_by_key(kind), node_projection(kind)))
        .param("key", key)
}

pub(crate) fn update_statement(kind: NodeKind, key: &str, props: &[CheckedProperty]) -> Statement {
    let (assignments, params) = set_clause("n", props, 0);
    Statement::new(format!(
        "{} SET {} RETURN {} AS node",
        match_by_key(kind),
        assignments,
        node_projection(kind)
    ))
    .param("key", key)
    .with_params(params)
}

pub(crate) fn remove_statement(kind: NodeKind, key: &str, names: &[&str]) -> Statement {
    let removals: Vec<String> = names.iter().map(|n| format!("n.{}", n)).collect();
    Statement::new(format!(
        "{} REMOVE {} RETURN {} AS node",
        match_by_key(kind),
        removals.join(", "),
        node_projection(kind)
    ))
    .param("key", key)
}

pub(crate) fn delete_statement(kind: NodeKind, key: &str) -> Statement {
    Statement::new(format!(
        "{} WITH n, n.{} AS key DETACH DELETE n RETURN count(key) AS deleted",
        match_by_key(kind),
        kind.key_field()
    ))
    .param("key", key)
}

fn not_found(kind: NodeKind, key: &str) -> FraudError {
    FraudError::not_found(format!("{} '{}'", kind, key))
}

fn first_or_not_found(kind: NodeKind, key: &str, rows: Vec<Value>) -> FraudResult<Value> {
    rows.into_iter().next().ok_or_else(|| not_found(kind, key))
}

/// Whether a node of `kind` with `key` exists.
pub async fn node_exists(client: &GraphClient, kind: NodeKind, key: &str) -> FraudResult<bool> {
    let counts: Vec<i64> = fetch(client, "node_exists", exists_statement(kind, key), "count").await?;
    Ok(counts.first().copied().unwrap_or(0) > 0)
}

/// Create a node. Required properties are enforced; the key is generated when
/// absent and `createdAt` is stamped for kinds that carry it.
pub async fn create_node(client: &GraphClient, kind: NodeKind, props: &Properties) -> FraudResult<Value> {
    let mut props = props.clone();
    let key = take_key(kind, &mut props)?;
    let mut checked = check_properties(kind.label(), kind.fields(), &props, CheckMode::Create)?;
    if kind.stamps_created_at() && !checked.iter().any(|p| p.name == "createdAt") {
        checked.push(CheckedProperty {
            name: "createdAt",
            value: PropertyValue::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
        });
    }

    if node_exists(client, kind, &key).await? {
        return Err(FraudError::conflict(format!("{} '{}'", kind, key)));
    }

    let rows = fetch(client, "create_node", create_statement(kind, &key, &checked), "node").await?;
    tracing::info!(kind = %kind, key = %key, "Node created");
    first_or_not_found(kind, &key, rows)
}

pub async fn list_nodes(client: &GraphClient, kind: NodeKind, limit: usize) -> FraudResult<Vec<Value>> {
    fetch(client, "list_nodes", list_statement(kind, limit), "node").await
}

pub async fn get_node(client: &GraphClient, kind: NodeKind, key: &str) -> FraudResult<Value> {
    let rows = fetch(client, "get_node", get_statement(kind, key), "node").await?;
    first_or_not_found(kind, key, rows)
}

/// Set allow-listed properties on an existing node.
pub async fn update_node(
    client: &GraphClient,
    kind: NodeKind,
    key: &str,
    props: &Properties,
) -> FraudResult<Value> {
    let checked = check_properties(kind.label(), kind.fields(), props, CheckMode::Update)?;
    let rows = fetch(client, "update_node", update_statement(kind, key, &checked), "node").await?;
    tracing::info!(kind = %kind, key, properties = checked.len(), "Node updated");
    first_or_not_found(kind, key, rows)
}

/// Remove optional properties from an existing node.
pub async fn remove_node_properties(
    client: &GraphClient,
    kind: NodeKind,
    key: &str,
    names: &[String],
) -> FraudResult<Value> {
    let removals = check_removals(kind.label(), kind.fields(), names)?;
    let rows = fetch(client, "remove_node_properties", remove_statement(kind, key, &removals), "node").await?;
    first_or_not_found(kind, key, rows)
}

/// Delete a node and its relationships.
pub async fn delete_node(client: &GraphClient, kind: NodeKind, key: &str) -> FraudResult<()> {
    let deleted: Vec<i64> = fetch(client, "delete_node", delete_statement(kind, key), "deleted").await?;
    if deleted.first().copied().unwrap_or(0) == 0 {
        return Err(not_found(kind, key));
    }
    tracing::info!(kind = %kind, key, "Node deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(json: Value) -> Properties {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_key_generated_when_absent() {
        let mut p = props(serde_json::json!({"city": "Lima", "country": "PE"}));
        let key = take_key(NodeKind::Location, &mut p).unwrap();
        assert!(Uuid::parse_str(&key).is_ok());
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_key_taken_from_body() {
        let mut p = props(serde_json::json!({"customerId": "c-9", "firstName": "Ana"}));
        assert_eq!(take_key(NodeKind::Customer, &mut p).unwrap(), "c-9");
        assert!(!p.contains_key("customerId"));
    }

    #[test]
    fn test_non_text_key_rejected() {
        let mut p = props(serde_json::json!({"accountId": 42}));
        assert!(matches!(
            take_key(NodeKind::Account, &mut p),
            Err(FraudError::Validation(_))
        ));
    }

    #[test]
    fn test_create_statement_binds_values() {
        let checked = vec![CheckedProperty {
            name: "deviceType",
            value: PropertyValue::Text("mobile".into()),
        }];
        let stmt = create_statement(NodeKind::Device, "d1", &checked);
        assert!(stmt
            .text()
            .starts_with("CREATE (n:Device {deviceId: $key}) SET n.deviceType = $p0 RETURN n {.deviceId"));
        assert!(stmt.has_param("key"));
        assert!(stmt.has_param("p0"));
        assert!(!stmt.text().contains("mobile"));
    }

    #[test]
    fn test_remove_and_delete_statements() {
        let stmt = remove_statement(NodeKind::Customer, "c1", &["email", "isVIP"]);
        assert!(stmt.text().contains("MATCH (n:Customer {customerId: $key}) REMOVE n.email, n.isVIP"));
        let stmt = delete_statement(NodeKind::Branch, "B-01");
        assert!(stmt.text().contains("DETACH DELETE n"));
        assert!(stmt.text().contains("count(key) AS deleted"));
    }

    #[test]
    fn test_list_statement_ordered_and_capped() {
        let stmt = list_statement(NodeKind::Account, 50);
        assert!(stmt.text().ends_with("ORDER BY n.accountId LIMIT $limit"));
    }
}
