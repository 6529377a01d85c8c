//! In-process graph store.
//!
//! Holds a snapshot of customers, accounts, ownership and transfers and
//! answers the [`GraphStore`] queries by depth-first enumeration, with the
//! same path semantics as a Cypher variable-length pattern: an edge is used
//! at most once per path, nodes may repeat. No server-side pruning is done;
//! every constraint is left to the analytics. Chain scans keep a bounded
//! top-`limit` heap rather than every path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use super::{ChainScan, CycleScan, GraphStore};
use crate::error::{FraudError, FraudResult};
use crate::model::{AccountNode, CustomerSummary, OwnedTransfer, PathMatch, TransferEdge};

/// Serializable content of a [`MemoryGraph`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSnapshot {
    pub customers: Vec<CustomerSummary>,
    pub accounts: Vec<SnapshotAccount>,
    pub owns: Vec<SnapshotOwnership>,
    pub transfers: Vec<SnapshotTransfer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotAccount {
    pub account_id: String,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub balance: Option<f64>,
    pub currency: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotOwnership {
    pub customer_id: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTransfer {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub currency: Option<String>,
    pub transaction_date: String,
    pub is_international: Option<bool>,
}

impl GraphSnapshot {
    /// Read a snapshot from a JSON file.
    pub fn load(path: &Path) -> FraudResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FraudError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| FraudError::Config(format!("invalid snapshot {}: {}", path.display(), e)))
    }

    pub fn customer(mut self, id: &str, first_name: &str, last_name: &str) -> Self {
        self.customers.push(CustomerSummary {
            customer_id: id.to_string(),
            first_name: Some(first_name.to_string()),
            last_name: Some(last_name.to_string()),
            email: None,
            is_high_risk: false,
            is_vip: false,
        });
        self
    }

    pub fn account(mut self, id: &str) -> Self {
        self.accounts.push(SnapshotAccount {
            account_id: id.to_string(),
            account_number: Some(format!("NUM-{}", id)),
            account_type: Some("Checking".to_string()),
            balance: None,
            currency: Some("USD".to_string()),
            created_at: None,
        });
        self
    }

    pub fn owns(mut self, customer_id: &str, account_id: &str) -> Self {
        self.owns.push(SnapshotOwnership {
            customer_id: customer_id.to_string(),
            account_id: account_id.to_string(),
        });
        self
    }

    pub fn transfer(mut self, from: &str, to: &str, amount: f64, date: &str) -> Self {
        self.transfers.push(SnapshotTransfer {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            currency: Some("USD".to_string()),
            transaction_date: date.to_string(),
            is_international: Some(false),
        });
        self
    }
}

/// Graph store backed by an in-memory snapshot.
///
/// Cheap to clone: clones share the snapshot. Path enumeration runs on the
/// blocking pool and stops as soon as the awaiting call is dropped, so a
/// caller's timeout bounds it.
#[derive(Debug, Clone)]
pub struct MemoryGraph {
    data: Arc<GraphData>,
}

#[derive(Debug)]
struct GraphData {
    customers: Vec<CustomerSummary>,
    accounts: Vec<AccountNode>,
    /// (customer index, account index)
    owns: Vec<(usize, usize)>,
    /// (source account index, target account index, edge)
    transfers: Vec<(usize, usize, TransferEdge)>,
    /// Outgoing transfer indices per account index.
    outgoing: Vec<Vec<usize>>,
}

/// Sets the flag when the owning future is dropped.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }
}

/// An open path kept while ranking chains. Greater means better: higher
/// total, then earlier discovery.
#[derive(Debug)]
struct RankedChain {
    total: f64,
    seq: usize,
    start: usize,
    edges: Vec<usize>,
}

impl Ord for RankedChain {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total
            .total_cmp(&other.total)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for RankedChain {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RankedChain {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedChain {}

impl MemoryGraph {
    /// Build the store, checking referential integrity and transfer invariants.
    pub fn new(snapshot: GraphSnapshot) -> FraudResult<Self> {
        let account_index: HashMap<&str, usize> = snapshot
            .accounts
            .iter()
            .enumerate()
            .map(|(i, a)| (a.account_id.as_str(), i))
            .collect();
        if account_index.len() != snapshot.accounts.len() {
            return Err(FraudError::validation("duplicate accountId in snapshot"));
        }
        let customer_index: HashMap<&str, usize> = snapshot
            .customers
            .iter()
            .enumerate()
            .map(|(i, c)| (c.customer_id.as_str(), i))
            .collect();

        let lookup_account = |id: &str| {
            account_index
                .get(id)
                .copied()
                .ok_or_else(|| FraudError::not_found(format!("Account '{}'", id)))
        };

        let mut owns = Vec::with_capacity(snapshot.owns.len());
        for o in &snapshot.owns {
            let customer = customer_index
                .get(o.customer_id.as_str())
                .copied()
                .ok_or_else(|| FraudError::not_found(format!("Customer '{}'", o.customer_id)))?;
            owns.push((customer, lookup_account(&o.account_id)?));
        }

        let mut transfers = Vec::with_capacity(snapshot.transfers.len());
        let mut outgoing = vec![Vec::new(); snapshot.accounts.len()];
        for (i, t) in snapshot.transfers.iter().enumerate() {
            if !(t.amount > 0.0 && t.amount.is_finite()) {
                return Err(FraudError::validation(format!(
                    "transfer {} -> {} has non-positive amount {}",
                    t.from, t.to, t.amount
                )));
            }
            let from = lookup_account(&t.from)?;
            let to = lookup_account(&t.to)?;
            outgoing[from].push(transfers.len());
            transfers.push((
                from,
                to,
                TransferEdge {
                    key: format!("t{}", i),
                    amount: t.amount,
                    currency: t.currency.clone(),
                    transaction_date: t.transaction_date.clone(),
                    is_international: t.is_international,
                },
            ));
        }

        let accounts = snapshot
            .accounts
            .into_iter()
            .map(|a| AccountNode {
                key: a.account_id.clone(),
                account_id: Some(a.account_id),
                account_number: a.account_number,
                account_type: a.account_type,
                balance: a.balance,
                currency: a.currency,
                created_at: a.created_at,
            })
            .collect();

        Ok(Self {
            data: Arc::new(GraphData {
                customers: snapshot.customers,
                accounts,
                owns,
                transfers,
                outgoing,
            }),
        })
    }

    pub fn account_count(&self) -> usize {
        self.data.accounts.len()
    }

    pub fn transfer_count(&self) -> usize {
        self.data.transfers.len()
    }

    /// Run a path enumeration on the blocking pool. Dropping the returned
    /// future raises the cancel flag the walk polls.
    async fn offload<T, F>(&self, operation: &str, walk: F) -> FraudResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&GraphData, &AtomicBool) -> T + Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancel));
        let data = Arc::clone(&self.data);
        tokio::task::spawn_blocking(move || walk(&*data, &*cancel))
            .await
            .map_err(|e| FraudError::query(format!("{}: path walk failed: {}", operation, e)))
    }
}

impl GraphData {
    fn build_path(&self, start: usize, edges: &[usize]) -> PathMatch {
        let mut nodes = Vec::with_capacity(edges.len() + 1);
        nodes.push(self.accounts[start].clone());
        let mut transfers = Vec::with_capacity(edges.len());
        for &e in edges {
            let (_, to, edge) = &self.transfers[e];
            nodes.push(self.accounts[*to].clone());
            transfers.push(edge.clone());
        }
        PathMatch { nodes, transfers }
    }

    /// Depth-first walk over edge-unique paths from `start`, calling `visit`
    /// with the current end node and edge list. Stops when `visit` returns
    /// false or `cancel` is raised; returns false in both cases.
    fn walk<F>(&self, start: usize, max_hops: usize, cancel: &AtomicBool, visit: &mut F) -> bool
    where
        F: FnMut(usize, &[usize]) -> bool,
    {
        let mut path = Vec::with_capacity(max_hops);
        let mut used = vec![false; self.transfers.len()];
        self.walk_from(start, max_hops, cancel, &mut path, &mut used, visit)
    }

    fn walk_from<F>(
        &self,
        current: usize,
        max_hops: usize,
        cancel: &AtomicBool,
        path: &mut Vec<usize>,
        used: &mut [bool],
        visit: &mut F,
    ) -> bool
    where
        F: FnMut(usize, &[usize]) -> bool,
    {
        if path.len() == max_hops {
            return true;
        }
        for &e in &self.outgoing[current] {
            if cancel.load(AtomicOrdering::Relaxed) {
                return false;
            }
            if used[e] {
                continue;
            }
            let next = self.transfers[e].1;
            used[e] = true;
            path.push(e);
            let keep_going =
                visit(next, path) && self.walk_from(next, max_hops, cancel, path, used, visit);
            path.pop();
            used[e] = false;
            if !keep_going {
                return false;
            }
        }
        true
    }

    fn cycles(&self, scan: &CycleScan, cancel: &AtomicBool) -> Vec<PathMatch> {
        let mut found = Vec::new();
        for start in 0..self.accounts.len() {
            if found.len() >= scan.limit || cancel.load(AtomicOrdering::Relaxed) {
                break;
            }
            self.walk(start, scan.max_hops, cancel, &mut |end, edges| {
                if end == start && edges.len() >= scan.min_hops {
                    found.push(self.build_path(start, edges));
                }
                found.len() < scan.limit
            });
        }
        found
    }

    /// Open paths ranked by total, keeping only the best `scan.limit` while
    /// walking.
    fn chains(&self, scan: &ChainScan, cancel: &AtomicBool) -> Vec<PathMatch> {
        if scan.limit == 0 {
            return Vec::new();
        }
        let mut kept: BinaryHeap<Reverse<RankedChain>> =
            BinaryHeap::with_capacity(scan.limit.saturating_add(1).min(1024));
        let mut seq = 0;
        for start in 0..self.accounts.len() {
            if !self.walk(start, scan.max_hops, cancel, &mut |end, edges| {
                if end != start && edges.len() >= scan.min_hops {
                    let total: f64 = edges.iter().map(|&e| self.transfers[e].2.amount).sum();
                    let candidate = RankedChain { total, seq, start, edges: Vec::new() };
                    seq += 1;
                    let admit = kept.len() < scan.limit
                        || kept.peek().is_some_and(|Reverse(worst)| candidate > *worst);
                    if admit {
                        kept.push(Reverse(RankedChain { edges: edges.to_vec(), ..candidate }));
                        if kept.len() > scan.limit {
                            kept.pop();
                        }
                    }
                }
                true
            }) {
                break;
            }
        }
        kept.into_sorted_vec()
            .into_iter()
            .map(|Reverse(chain)| self.build_path(chain.start, &chain.edges))
            .collect()
    }
}

#[async_trait]
impl GraphStore for MemoryGraph {
    async fn transfer_cycles(&self, scan: &CycleScan) -> FraudResult<Vec<PathMatch>> {
        let scan = *scan;
        self.offload("transfer_cycles", move |data, cancel| data.cycles(&scan, cancel))
            .await
    }

    async fn transfer_chains(&self, scan: &ChainScan) -> FraudResult<Vec<PathMatch>> {
        let scan = *scan;
        self.offload("transfer_chains", move |data, cancel| data.chains(&scan, cancel))
            .await
    }

    async fn owned_transfers(&self, limit: Option<usize>) -> FraudResult<Vec<OwnedTransfer>> {
        let data = &self.data;
        let cap = limit.unwrap_or(usize::MAX);
        let records = data
            .owns
            .iter()
            .flat_map(|&(customer, account)| {
                let c = &data.customers[customer];
                data.outgoing[account].iter().map(move |&e| {
                    let edge = &data.transfers[e].2;
                    OwnedTransfer {
                        customer_id: c.customer_id.clone(),
                        first_name: c.first_name.clone(),
                        last_name: c.last_name.clone(),
                        amount: edge.amount,
                        transaction_date: edge.transaction_date.clone(),
                    }
                })
            })
            .take(cap)
            .collect();
        Ok(records)
    }

    async fn flagged_customers(&self, limit: usize) -> FraudResult<Vec<CustomerSummary>> {
        let mut flagged: Vec<CustomerSummary> = self
            .data
            .customers
            .iter()
            .filter(|c| c.is_high_risk || c.is_vip)
            .cloned()
            .collect();
        flagged.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
        flagged.truncate(limit);
        Ok(flagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::rings::RingPolicy;

    fn triangle() -> MemoryGraph {
        MemoryGraph::new(
            GraphSnapshot::default()
                .account("a")
                .account("b")
                .account("c")
                .transfer("a", "b", 100.0, "2024-01-01 10:00:00")
                .transfer("b", "c", 90.0, "2024-01-01 11:00:00")
                .transfer("c", "a", 85.0, "2024-01-01 12:00:00"),
        )
        .unwrap()
    }

    fn cycle_scan(limit: usize) -> CycleScan {
        CycleScan {
            policy: RingPolicy::Simple,
            min_hops: 3,
            max_hops: 6,
            retention_ratio: 0.8,
            limit,
        }
    }

    #[tokio::test]
    async fn test_triangle_found_from_each_rotation() {
        let cycles = triangle().transfer_cycles(&cycle_scan(100)).await.unwrap();
        // One match per starting account, as a Cypher pattern anchored on (a) yields.
        assert_eq!(cycles.len(), 3);
        for c in &cycles {
            assert!(c.is_consistent());
            assert_eq!(c.hops(), 3);
            assert_eq!(c.start().unwrap().key, c.end().unwrap().key);
        }
    }

    #[tokio::test]
    async fn test_cycle_limit_respected() {
        let cycles = triangle().transfer_cycles(&cycle_scan(2)).await.unwrap();
        assert_eq!(cycles.len(), 2);
    }

    #[tokio::test]
    async fn test_chains_exclude_cycles_and_rank_by_total() {
        let scan = ChainScan { min_hops: 2, max_hops: 5, limit: 10 };
        let chains = triangle().transfer_chains(&scan).await.unwrap();
        // 2-hop open paths: a->b->c, b->c->a, c->a->b
        assert_eq!(chains.len(), 3);
        assert!(chains.iter().all(|c| c.start().unwrap().key != c.end().unwrap().key));
        assert_eq!(chains[0].total_amount(), 190.0);
    }

    fn complete_graph(n: usize) -> MemoryGraph {
        let ids: Vec<String> = (0..n).map(|i| format!("acc{:02}", i)).collect();
        let mut snapshot = GraphSnapshot::default();
        for id in &ids {
            snapshot = snapshot.account(id);
        }
        for (i, from) in ids.iter().enumerate() {
            for (j, to) in ids.iter().enumerate() {
                if i != j {
                    let amount = 10.0 + ((i * 7 + j * 3) % 11) as f64;
                    snapshot = snapshot.transfer(from, to, amount, "2024-01-01 10:00:00");
                }
            }
        }
        MemoryGraph::new(snapshot).unwrap()
    }

    fn keys(paths: &[PathMatch]) -> Vec<Vec<String>> {
        paths
            .iter()
            .map(|p| p.transfers.iter().map(|t| t.key.clone()).collect())
            .collect()
    }

    #[tokio::test]
    async fn test_bounded_chain_ranking_matches_full_ranking() {
        let graph = complete_graph(5);
        let all = graph
            .transfer_chains(&ChainScan { min_hops: 2, max_hops: 3, limit: usize::MAX })
            .await
            .unwrap();
        let top = graph
            .transfer_chains(&ChainScan { min_hops: 2, max_hops: 3, limit: 7 })
            .await
            .unwrap();
        assert_eq!(top.len(), 7);
        assert_eq!(keys(&top), keys(&all[..7]));
        assert!(all
            .windows(2)
            .all(|w| w[0].total_amount() >= w[1].total_amount()));
    }

    #[test]
    fn test_raised_cancel_stops_walk() {
        let graph = complete_graph(6);
        let cancel = AtomicBool::new(true);
        let scan = ChainScan { min_hops: 2, max_hops: 5, limit: 10 };
        assert!(graph.data.chains(&scan, &cancel).is_empty());
        assert!(graph.data.cycles(&cycle_scan(100), &cancel).is_empty());
    }

    #[tokio::test]
    async fn test_chain_limit_zero() {
        let chains = triangle()
            .transfer_chains(&ChainScan { min_hops: 2, max_hops: 5, limit: 0 })
            .await
            .unwrap();
        assert!(chains.is_empty());
    }

    #[tokio::test]
    async fn test_owned_transfers_one_record_per_owner() {
        let graph = MemoryGraph::new(
            GraphSnapshot::default()
                .customer("c1", "Ana", "López")
                .customer("c2", "Luis", "Pérez")
                .account("a")
                .account("b")
                .owns("c1", "a")
                .owns("c2", "a")
                .transfer("a", "b", 10.0, "2024-01-01 10:00:00"),
        )
        .unwrap();
        let records = graph.owned_transfers(None).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(graph.owned_transfers(Some(1)).await.unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_account_rejected() {
        let err = MemoryGraph::new(GraphSnapshot::default().account("a").transfer("a", "zz", 1.0, "2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, FraudError::NotFound(_)));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let err = MemoryGraph::new(
            GraphSnapshot::default().account("a").account("b").transfer("a", "b", 0.0, "2024-01-01"),
        )
        .unwrap_err();
        assert!(matches!(err, FraudError::Validation(_)));
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot: GraphSnapshot = serde_json::from_str(
            r#"{
                "customers": [{"customerId": "c1", "firstName": "Ana", "lastName": "López", "email": null, "isHighRisk": true}],
                "accounts": [{"accountId": "a1", "accountNumber": "GT01"}, {"accountId": "a2"}],
                "owns": [{"customerId": "c1", "accountId": "a1"}],
                "transfers": [{"from": "a1", "to": "a2", "amount": 50.5, "transactionDate": "2024-02-01 22:00:00"}]
            }"#,
        )
        .unwrap();
        let graph = MemoryGraph::new(snapshot).unwrap();
        assert_eq!(graph.account_count(), 2);
        assert_eq!(graph.transfer_count(), 1);
    }
}
