//! Relation CRUD for the closed set of relation kinds.
//!
//! Relations are addressed by kind and endpoint keys. The duplicate check
//! for non-parallel kinds is a separate query from the create, so two
//! concurrent creates can still both succeed.

use chrono::{SecondsFormat, Utc};
use fraudgraph_core::schema::{
    check_properties, CheckMode, CheckedProperty, Properties, PropertyValue, RelationKind,
};
use fraudgraph_core::{FraudError, FraudResult};
use serde::Deserialize;
use serde_json::Value;

use super::{fetch, projection, set_clause, Statement};
use crate::GraphClient;

/// `MATCH (a:Src {key: $from})-[r:type]->(b:Dst {key: $to})`
fn match_between(kind: RelationKind) -> String {
    let (src, dst) = (kind.source(), kind.target());
    format!(
        "MATCH (a:{} {{{}: $from}})-[r:{}]->(b:{} {{{}: $to}})",
        src.label(),
        src.key_field(),
        kind.rel_type(),
        dst.label(),
        dst.key_field()
    )
}

fn relation_projection(kind: RelationKind) -> String {
    format!(
        "{{from: a.{}, to: b.{}, type: type(r), properties: {}}}",
        kind.source().key_field(),
        kind.target().key_field(),
        projection("r", None, kind.fields())
    )
}

/// Checks specific to a kind, applied after the allow-list check.
pub(crate) fn prepare(kind: RelationKind, props: &Properties) -> FraudResult<Vec<CheckedProperty>> {
    let mut checked = check_properties(kind.rel_type(), kind.fields(), props, CheckMode::Create)?;
    if kind == RelationKind::Transfers {
        let amount = checked.iter().find_map(|p| match (p.name, &p.value) {
            ("amount", PropertyValue::Float(a)) => Some(*a),
            _ => None,
        });
        if !amount.is_some_and(|a| a > 0.0) {
            return Err(FraudError::validation("transfer amount must be greater than zero"));
        }
        if !checked.iter().any(|p| p.name == "transactionDate") {
            checked.push(CheckedProperty {
                name: "transactionDate",
                value: PropertyValue::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
            });
        }
    }
    Ok(checked)
}

pub(crate) fn endpoints_statement(kind: RelationKind, from: &str, to: &str) -> Statement {
    let (src, dst) = (kind.source(), kind.target());
    Statement::new(format!(
        "OPTIONAL MATCH (a:{} {{{}: $from}}) \
         OPTIONAL MATCH (b:{} {{{}: $to}}) \
         RETURN {{fromExists: a IS NOT NULL, toExists: b IS NOT NULL}} AS endpoints LIMIT 1",
        src.label(),
        src.key_field(),
        dst.label(),
        dst.key_field()
    ))
    .param("from", from)
    .param("to", to)
}

pub(crate) fn count_statement(kind: RelationKind, from: &str, to: &str) -> Statement {
    Statement::new(format!("{} RETURN count(r) AS count", match_between(kind)))
        .param("from", from)
        .param("to", to)
}

pub(crate) fn create_statement(
    kind: RelationKind,
    from: &str,
    to: &str,
    props: &[CheckedProperty],
) -> Statement {
    let (src, dst) = (kind.source(), kind.target());
    let (assignments, params) = set_clause("r", props, 0);
    let set = if assignments.is_empty() {
        String::new()
    } else {
        format!(" SET {}", assignments)
    };
    Statement::new(format!(
        "MATCH (a:{} {{{}: $from}}), (b:{} {{{}: $to}}) CREATE (a)-[r:{}]->(b){} RETURN {} AS relation",
        src.label(),
        src.key_field(),
        dst.label(),
        dst.key_field(),
        kind.rel_type(),
        set,
        relation_projection(kind)
    ))
    .param("from", from)
    .param("to", to)
    .with_params(params)
}

pub(crate) fn list_statement(kind: RelationKind, limit: usize) -> Statement {
    let (src, dst) = (kind.source(), kind.target());
    Statement::new(format!(
        "MATCH (a:{})-[r:{}]->(b:{}) RETURN {} AS relation ORDER BY relation.from, relation.to LIMIT $limit",
        src.label(),
        kind.rel_type(),
        dst.label(),
        relation_projection(kind)
    ))
    .param("limit", limit as i64)
}

pub(crate) fn update_statement(
    kind: RelationKind,
    from: &str,
    to: &str,
    props: &[CheckedProperty],
) -> Statement {
    let (assignments, params) = set_clause("r", props, 0);
    Statement::new(format!(
        "{} SET {} RETURN {} AS relation",
        match_between(kind),
        assignments,
        relation_projection(kind)
    ))
    .param("from", from)
    .param("to", to)
    .with_params(params)
}

pub(crate) fn delete_statement(kind: RelationKind, from: &str, to: &str) -> Statement {
    Statement::new(format!(
        "{} WITH r, type(r) AS t DELETE r RETURN count(t) AS deleted",
        match_between(kind)
    ))
    .param("from", from)
    .param("to", to)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Endpoints {
    from_exists: bool,
    to_exists: bool,
}

fn describe(kind: RelationKind, from: &str, to: &str) -> String {
    format!("{} relation from '{}' to '{}'", kind, from, to)
}

/// Create a relation between two existing nodes.
///
/// Fails with `NotFound` when an endpoint is missing and, for kinds that
/// do not allow parallel edges, with `Conflict` when one already exists.
pub async fn create_relation(
    client: &GraphClient,
    kind: RelationKind,
    from: &str,
    to: &str,
    props: &Properties,
) -> FraudResult<Value> {
    let checked = prepare(kind, props)?;

    let endpoints: Vec<Endpoints> =
        fetch(client, "relation_endpoints", endpoints_statement(kind, from, to), "endpoints").await?;
    let endpoints = endpoints.into_iter().next().unwrap_or(Endpoints {
        from_exists: false,
        to_exists: false,
    });
    if !endpoints.from_exists {
        return Err(FraudError::not_found(format!("{} '{}'", kind.source(), from)));
    }
    if !endpoints.to_exists {
        return Err(FraudError::not_found(format!("{} '{}'", kind.target(), to)));
    }

    if !kind.allows_parallel() {
        let counts: Vec<i64> =
            fetch(client, "relation_exists", count_statement(kind, from, to), "count").await?;
        if counts.first().copied().unwrap_or(0) > 0 {
            return Err(FraudError::conflict(describe(kind, from, to)));
        }
    }

    let rows: Vec<Value> = fetch(
        client,
        "create_relation",
        create_statement(kind, from, to, &checked),
        "relation",
    )
    .await?;
    tracing::info!(kind = %kind, from, to, "Relation created");
    rows.into_iter()
        .next()
        .ok_or_else(|| FraudError::not_found(describe(kind, from, to)))
}

pub async fn list_relations(client: &GraphClient, kind: RelationKind, limit: usize) -> FraudResult<Vec<Value>> {
    fetch(client, "list_relations", list_statement(kind, limit), "relation").await
}

/// Set properties on every `kind` relation between the endpoints.
pub async fn update_relation(
    client: &GraphClient,
    kind: RelationKind,
    from: &str,
    to: &str,
    props: &Properties,
) -> FraudResult<Vec<Value>> {
    let checked = check_properties(kind.rel_type(), kind.fields(), props, CheckMode::Update)?;
    if kind == RelationKind::Transfers {
        let bad_amount = checked
            .iter()
            .any(|p| matches!((p.name, &p.value), ("amount", PropertyValue::Float(a)) if *a <= 0.0));
        if bad_amount {
            return Err(FraudError::validation("transfer amount must be greater than zero"));
        }
    }
    let rows: Vec<Value> = fetch(
        client,
        "update_relation",
        update_statement(kind, from, to, &checked),
        "relation",
    )
    .await?;
    if rows.is_empty() {
        return Err(FraudError::not_found(describe(kind, from, to)));
    }
    tracing::info!(kind = %kind, from, to, updated = rows.len(), "Relation updated");
    Ok(rows)
}

/// Delete every `kind` relation between the endpoints; returns how many.
pub async fn delete_relation(client: &GraphClient, kind: RelationKind, from: &str, to: &str) -> FraudResult<usize> {
    let deleted: Vec<i64> = fetch(client, "delete_relation", delete_statement(kind, from, to), "deleted").await?;
    let deleted = deleted.first().copied().unwrap_or(0);
    if deleted == 0 {
        return Err(FraudError::not_found(describe(kind, from, to)));
    }
    tracing::info!(kind = %kind, from, to, deleted, "Relation deleted");
    Ok(deleted as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(json: Value) -> Properties {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_transfer_requires_positive_amount() {
        let err = prepare(RelationKind::Transfers, &props(serde_json::json!({"amount": 0, "currency": "USD"})))
            .unwrap_err();
        assert!(matches!(err, FraudError::Validation(_)));
    }

    #[test]
    fn test_transfer_date_defaults_to_now() {
        let checked = prepare(
            RelationKind::Transfers,
            &props(serde_json::json!({"amount": 250, "currency": "USD"})),
        )
        .unwrap();
        let date = checked.iter().find(|p| p.name == "transactionDate").unwrap();
        match &date.value {
            PropertyValue::Text(s) => assert!(fraudgraph_core::timestamp::parse(s).is_some()),
            other => panic!("unexpected value {:?}", other),
        }
        // Integer JSON accepted for the float field.
        assert!(checked
            .iter()
            .any(|p| p.name == "amount" && p.value == PropertyValue::Float(250.0)));
    }

    #[test]
    fn test_unknown_relation_property_rejected() {
        let err = prepare(RelationKind::Owns, &props(serde_json::json!({"role": "admin"}))).unwrap_err();
        assert!(matches!(err, FraudError::Validation(_)));
    }

    #[test]
    fn test_match_uses_endpoint_labels_and_keys() {
        let stmt = count_statement(RelationKind::ServicedBy, "c1", "B-01");
        assert!(stmt.text().starts_with(
            "MATCH (a:Customer {customerId: $from})-[r:serviced_by]->(b:Branch {branchCode: $to})"
        ));
    }

    #[test]
    fn test_create_statement_binds_values() {
        let checked = vec![CheckedProperty {
            name: "trustLevel",
            value: PropertyValue::Integer(3),
        }];
        let stmt = create_statement(RelationKind::Trusts, "c1", "c2", &checked);
        assert!(stmt.text().contains("CREATE (a)-[r:trusts]->(b) SET r.trustLevel = $p0"));
        assert!(stmt.has_param("from") && stmt.has_param("to") && stmt.has_param("p0"));
    }

    #[test]
    fn test_endpoint_lookup_reports_both_sides() {
        let stmt = endpoints_statement(RelationKind::LocatedAt, "d1", "l1");
        assert!(stmt.text().contains("OPTIONAL MATCH (a:Device {deviceId: $from})"));
        assert!(stmt.text().contains("OPTIONAL MATCH (b:Location {locationId: $to})"));
    }
}
