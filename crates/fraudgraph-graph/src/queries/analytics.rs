//! Analytic pattern queries: the Neo4j [`GraphStore`].
//!
//! Ring policies are pushed into the `WHERE` clause so the scan limit keeps
//! admissible candidates; the analytics re-check every path in process.

use async_trait::async_trait;
use fraudgraph_core::analytics::RingPolicy;
use fraudgraph_core::model::{AccountNode, CustomerSummary, OwnedTransfer, PathMatch, TransferEdge};
use fraudgraph_core::store::{ChainScan, CycleScan, GraphStore};
use fraudgraph_core::FraudResult;

use super::{fetch, query_failed, Statement};
use crate::GraphClient;

const NODE_MAP: &str = "[n IN nodes(path) | {key: elementId(n), accountId: n.accountId, \
    accountNumber: n.accountNumber, accountType: n.accountType, balance: toFloat(n.balance), \
    currency: n.currency, createdAt: toString(n.createdAt)}] AS nodes";

const EDGE_MAP: &str = "[r IN relationships(path) | {key: elementId(r), \
    amount: coalesce(toFloat(r.amount), 0.0), currency: r.currency, \
    transactionDate: coalesce(toString(r.transactionDate), ''), \
    isInternational: r.isInternational}] AS transfers";

/// Date shapes `datetime()` is handed; anything else compares as null so the
/// path is rejected instead of failing the whole query.
pub(crate) const DATE_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}([ T]\d{2}:\d{2}(:\d{2}(\.\d+)?)?)?(Z|[+-]\d{2}(:?\d{2})?)?(\[[^\]]+\])?$";

/// Normalized transfer timestamp of `rs[i]`, null when it does not parse.
fn ts(index: &str) -> String {
    format!(
        "CASE WHEN toString(rs[{0}].transactionDate) =~ $datePattern \
         THEN datetime(replace(toString(rs[{0}].transactionDate), ' ', 'T')) END",
        index
    )
}

/// `WHERE` predicate over `ns` (path nodes), `rs` (path relationships) and
/// the anchor `a`.
pub(crate) fn ring_predicate(policy: RingPolicy) -> Option<String> {
    let unique = "ALL(n IN ns[1..-1] WHERE n <> a AND single(m IN ns[1..-1] WHERE m = n))".to_string();
    let chronological = format!(
        "ALL(i IN range(0, size(rs) - 2) WHERE {} < {})",
        ts("i"),
        ts("i + 1")
    );
    let deduction =
        "ALL(i IN range(0, size(rs) - 2) WHERE toFloat(rs[i + 1].amount) >= toFloat(rs[i].amount) * $ratio)";

    match policy {
        RingPolicy::Simple => None,
        RingPolicy::Unique => Some(unique),
        RingPolicy::Chronological => Some(format!("{} AND {}", unique, chronological)),
        RingPolicy::Deduction => Some(format!("{} AND {} AND {}", unique, chronological, deduction)),
    }
}

pub(crate) fn cycle_statement(scan: &CycleScan) -> Statement {
    let filter = ring_predicate(scan.policy)
        .map(|p| format!("WHERE {}\n", p))
        .unwrap_or_default();
    let text = format!(
        "MATCH path = (a:Account)-[:transfers*{}..{}]->(a)\n\
         WITH a, path, nodes(path) AS ns, relationships(path) AS rs\n\
         {}RETURN {}, {}\n\
         LIMIT $limit",
        scan.min_hops, scan.max_hops, filter, NODE_MAP, EDGE_MAP
    );
    let mut statement = Statement::new(text).param("limit", scan.limit as i64);
    if matches!(scan.policy, RingPolicy::Chronological | RingPolicy::Deduction) {
        statement = statement.param("datePattern", DATE_PATTERN);
    }
    if scan.policy == RingPolicy::Deduction {
        statement = statement.param("ratio", scan.retention_ratio);
    }
    statement
}

pub(crate) fn chain_statement(scan: &ChainScan) -> Statement {
    let text = format!(
        "MATCH path = (a:Account)-[:transfers*{}..{}]->(b:Account)\n\
         WHERE a <> b\n\
         WITH path, reduce(total = 0.0, r IN relationships(path) | total + toFloat(r.amount)) AS total\n\
         ORDER BY total DESC\n\
         LIMIT $limit\n\
         RETURN {}, {}",
        scan.min_hops, scan.max_hops, NODE_MAP, EDGE_MAP
    );
    Statement::new(text).param("limit", scan.limit as i64)
}

pub(crate) fn owned_transfers_statement(limit: Option<usize>) -> Statement {
    let mut text = String::from(
        "MATCH (c:Customer)-[:owns]->(:Account)-[t:transfers]->(:Account)\n\
         RETURN {customerId: c.customerId, firstName: c.firstName, lastName: c.lastName, \
         amount: coalesce(toFloat(t.amount), 0.0), \
         transactionDate: coalesce(toString(t.transactionDate), '')} AS record\n\
         ORDER BY c.customerId, elementId(t)",
    );
    match limit {
        Some(limit) => {
            text.push_str("\nLIMIT $limit");
            Statement::new(text).param("limit", limit as i64)
        }
        None => Statement::new(text),
    }
}

pub(crate) fn flagged_customers_statement(limit: usize) -> Statement {
    Statement::new(
        "MATCH (c:Customer)\n\
         WHERE c.isHighRisk = true OR c.isVIP = true\n\
         RETURN {customerId: coalesce(c.customerId, elementId(c)), firstName: c.firstName, \
         lastName: c.lastName, email: c.email, isHighRisk: coalesce(c.isHighRisk, false), \
         isVIP: coalesce(c.isVIP, false)} AS customer\n\
         ORDER BY customer.customerId\n\
         LIMIT $limit",
    )
    .param("limit", limit as i64)
}

/// [`GraphStore`] over a live Neo4j database.
#[derive(Clone)]
pub struct Neo4jStore {
    client: GraphClient,
}

impl Neo4jStore {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    async fn paths(&self, operation: &str, statement: Statement) -> FraudResult<Vec<PathMatch>> {
        let rows = self
            .client
            .query(statement.into_query())
            .await
            .map_err(|e| query_failed(operation, e))?;

        let mut paths = Vec::with_capacity(rows.len());
        for row in rows {
            let nodes = row.get::<Vec<AccountNode>>("nodes");
            let transfers = row.get::<Vec<TransferEdge>>("transfers");
            match (nodes, transfers) {
                (Ok(nodes), Ok(transfers)) => paths.push(PathMatch { nodes, transfers }),
                (n, t) => {
                    return Err(query_failed(
                        operation,
                        anyhow::anyhow!("undecodable path row: nodes {:?}, transfers {:?}", n.err(), t.err()),
                    ))
                }
            }
        }
        tracing::debug!(operation, paths = paths.len(), "Path query returned");
        Ok(paths)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn transfer_cycles(&self, scan: &CycleScan) -> FraudResult<Vec<PathMatch>> {
        self.paths("transfer_cycles", cycle_statement(scan)).await
    }

    async fn transfer_chains(&self, scan: &ChainScan) -> FraudResult<Vec<PathMatch>> {
        self.paths("transfer_chains", chain_statement(scan)).await
    }

    async fn owned_transfers(&self, limit: Option<usize>) -> FraudResult<Vec<OwnedTransfer>> {
        fetch(&self.client, "owned_transfers", owned_transfers_statement(limit), "record").await
    }

    async fn flagged_customers(&self, limit: usize) -> FraudResult<Vec<CustomerSummary>> {
        fetch(&self.client, "flagged_customers", flagged_customers_statement(limit), "customer").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(policy: RingPolicy) -> CycleScan {
        CycleScan {
            policy,
            min_hops: 3,
            max_hops: 6,
            retention_ratio: 0.8,
            limit: 10_000,
        }
    }

    #[test]
    fn test_simple_ring_query_has_no_filter() {
        let stmt = cycle_statement(&scan(RingPolicy::Simple));
        assert!(stmt.text().contains("(a:Account)-[:transfers*3..6]->(a)"));
        assert!(!stmt.text().contains("WHERE"));
        assert!(stmt.has_param("limit"));
        assert!(!stmt.has_param("ratio"));
    }

    #[test]
    fn test_policy_predicates_accumulate() {
        let unique = ring_predicate(RingPolicy::Unique).unwrap();
        let chrono = ring_predicate(RingPolicy::Chronological).unwrap();
        let deduction = ring_predicate(RingPolicy::Deduction).unwrap();
        assert!(chrono.starts_with(&unique));
        assert!(deduction.starts_with(&chrono));
        assert!(chrono.contains("replace(toString(rs[i].transactionDate), ' ', 'T')"));
        assert!(deduction.contains("* $ratio"));
    }

    #[test]
    fn test_unparseable_date_compares_as_null() {
        let chrono = ring_predicate(RingPolicy::Chronological).unwrap();
        assert!(chrono.contains("CASE WHEN toString(rs[i].transactionDate) =~ $datePattern"));
        assert!(cycle_statement(&scan(RingPolicy::Chronological)).has_param("datePattern"));
        assert!(!cycle_statement(&scan(RingPolicy::Unique)).has_param("datePattern"));
    }

    #[test]
    fn test_deduction_binds_ratio() {
        let stmt = cycle_statement(&scan(RingPolicy::Deduction));
        assert!(stmt.has_param("ratio"));
        assert!(stmt.text().contains("WHERE ALL("));
    }

    #[test]
    fn test_chain_query_excludes_closed_paths() {
        let stmt = chain_statement(&ChainScan { min_hops: 2, max_hops: 5, limit: 10 });
        assert!(stmt.text().contains("[:transfers*2..5]->(b:Account)"));
        assert!(stmt.text().contains("WHERE a <> b"));
        assert!(stmt.text().contains("ORDER BY total DESC"));
    }

    #[test]
    fn test_owned_transfers_limit_optional() {
        assert!(!owned_transfers_statement(None).text().contains("LIMIT"));
        let sampled = owned_transfers_statement(Some(100));
        assert!(sampled.text().ends_with("LIMIT $limit"));
        assert!(sampled.has_param("limit"));
    }

    #[test]
    fn test_flagged_customers_query() {
        let stmt = flagged_customers_statement(20);
        assert!(stmt.text().contains("c.isHighRisk = true OR c.isVIP = true"));
    }
}
