//! Fraud-ring cycle detection.
//!
//! A ring is a directed cycle of `transfers` edges that returns to its start
//! account. Candidates come from the store; each [`RingPolicy`] tightens the
//! previous one, so the admitted sets nest:
//! `deduction ⊆ chronological ⊆ unique ⊆ simple`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::FraudError;
use crate::model::{AccountNode, PathMatch, TransferEdge};

/// Constraint level applied to candidate cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingPolicy {
    /// Any cycle within the hop bounds.
    Simple,
    /// No node visited twice except the start, which closes the cycle.
    Unique,
    /// Unique, with strictly increasing transfer timestamps.
    Chronological,
    /// Chronological, with every hop retaining a share of the previous amount.
    Deduction,
}

impl RingPolicy {
    pub const ALL: [RingPolicy; 4] = [
        RingPolicy::Simple,
        RingPolicy::Unique,
        RingPolicy::Chronological,
        RingPolicy::Deduction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RingPolicy::Simple => "simple",
            RingPolicy::Unique => "unique",
            RingPolicy::Chronological => "chronological",
            RingPolicy::Deduction => "deduction",
        }
    }

    /// Whether `path` is a ring under this policy.
    pub fn admits(&self, path: &PathMatch, retention_ratio: f64) -> bool {
        if !is_closed(path) {
            return false;
        }
        match self {
            RingPolicy::Simple => true,
            RingPolicy::Unique => visits_once(path),
            RingPolicy::Chronological => visits_once(path) && is_chronological(&path.transfers),
            RingPolicy::Deduction => {
                visits_once(path)
                    && is_chronological(&path.transfers)
                    && retains(&path.transfers, retention_ratio)
            }
        }
    }
}

impl Default for RingPolicy {
    fn default() -> Self {
        RingPolicy::Deduction
    }
}

impl fmt::Display for RingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RingPolicy {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(RingPolicy::Simple),
            "unique" => Ok(RingPolicy::Unique),
            "chronological" => Ok(RingPolicy::Chronological),
            "deduction" | "robust" => Ok(RingPolicy::Deduction),
            other => Err(FraudError::validation(format!(
                "unknown ring policy '{}' (expected simple, unique, chronological or deduction)",
                other
            ))),
        }
    }
}

fn is_closed(path: &PathMatch) -> bool {
    path.is_consistent()
        && matches!((path.start(), path.end()), (Some(s), Some(e)) if s.key == e.key)
}

/// The start key occurs exactly at both ends and no interior key repeats.
fn visits_once(path: &PathMatch) -> bool {
    let Some(start) = path.start() else {
        return false;
    };
    let interior = &path.nodes[1..path.nodes.len() - 1];
    let mut seen = HashSet::with_capacity(interior.len());
    interior
        .iter()
        .all(|n| n.key != start.key && seen.insert(n.key.as_str()))
}

/// Adjacent edges have strictly increasing timestamps. An unparseable date
/// fails the check.
fn is_chronological(transfers: &[TransferEdge]) -> bool {
    let mut times = Vec::with_capacity(transfers.len());
    for t in transfers {
        match t.time() {
            Some(time) => times.push(time),
            None => return false,
        }
    }
    times.windows(2).all(|w| w[0] < w[1])
}

fn retains(transfers: &[TransferEdge], ratio: f64) -> bool {
    transfers
        .windows(2)
        .all(|w| w[1].amount >= w[0].amount * ratio)
}

/// A detected ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudRing {
    pub start_account: String,
    pub hops: usize,
    pub total_amount: f64,
    pub nodes: Vec<AccountNode>,
    pub transfers: Vec<TransferEdge>,
}

impl FraudRing {
    fn from_path(path: PathMatch) -> Self {
        Self {
            start_account: path
                .start()
                .map(|n| n.display_name().to_string())
                .unwrap_or_default(),
            hops: path.hops(),
            total_amount: path.total_amount(),
            nodes: path.nodes,
            transfers: path.transfers,
        }
    }
}

/// Filter candidates through `policy`, order them deterministically and keep
/// at most `max_results`.
pub fn detect(
    candidates: Vec<PathMatch>,
    policy: RingPolicy,
    retention_ratio: f64,
    max_results: usize,
) -> Vec<FraudRing> {
    let scanned = candidates.len();
    let mut admitted: Vec<PathMatch> = candidates
        .into_iter()
        .filter(|p| policy.admits(p, retention_ratio))
        .collect();
    admitted.sort_by(compare_paths);
    admitted.truncate(max_results);

    tracing::debug!(
        policy = %policy,
        scanned,
        admitted = admitted.len(),
        "Ring candidates filtered"
    );

    admitted.into_iter().map(FraudRing::from_path).collect()
}

/// Start account number, account id, node keys, then edge timestamps and keys.
fn compare_paths(a: &PathMatch, b: &PathMatch) -> Ordering {
    let start_a = a.start();
    let start_b = b.start();
    let number = |n: Option<&AccountNode>| n.and_then(|n| n.account_number.clone());
    let id = |n: Option<&AccountNode>| n.and_then(|n| n.account_id.clone());

    number(start_a)
        .cmp(&number(start_b))
        .then_with(|| id(start_a).cmp(&id(start_b)))
        .then_with(|| {
            a.nodes
                .iter()
                .map(|n| n.key.as_str())
                .cmp(b.nodes.iter().map(|n| n.key.as_str()))
        })
        .then_with(|| {
            a.transfers
                .iter()
                .map(|t| t.time())
                .cmp(b.transfers.iter().map(|t| t.time()))
        })
        .then_with(|| {
            a.transfers
                .iter()
                .map(|t| t.key.as_str())
                .cmp(b.transfers.iter().map(|t| t.key.as_str()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CycleScan, GraphSnapshot, GraphStore, MemoryGraph};

    fn scan() -> CycleScan {
        CycleScan {
            policy: RingPolicy::Simple,
            min_hops: 3,
            max_hops: 6,
            retention_ratio: 0.8,
            limit: 100_000,
        }
    }

    async fn rings(graph: &MemoryGraph, policy: RingPolicy) -> Vec<FraudRing> {
        let candidates = graph.transfer_cycles(&scan()).await.unwrap();
        detect(candidates, policy, 0.8, usize::MAX)
    }

    fn triangle(third_amount: f64) -> MemoryGraph {
        MemoryGraph::new(
            GraphSnapshot::default()
                .account("A")
                .account("B")
                .account("C")
                .transfer("A", "B", 100.0, "2024-03-01T09:00:00")
                .transfer("B", "C", 90.0, "2024-03-01T10:00:00")
                .transfer("C", "A", third_amount, "2024-03-01T11:00:00"),
        )
        .unwrap()
    }

    fn identity(ring: &FraudRing) -> Vec<String> {
        ring.transfers.iter().map(|t| t.key.clone()).collect()
    }

    /// Small linear congruential generator so the graphs are reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self, bound: u64) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) % bound
        }
    }

    fn random_graph(seed: u64) -> MemoryGraph {
        let mut rng = Lcg(seed);
        let accounts = 6;
        let mut snapshot = GraphSnapshot::default();
        for i in 0..accounts {
            snapshot = snapshot.account(&format!("acc{}", i));
        }
        for _ in 0..14 {
            let from = rng.next(accounts);
            let mut to = rng.next(accounts);
            if to == from {
                to = (to + 1) % accounts;
            }
            let amount = 50.0 + rng.next(950) as f64;
            let date = format!("2024-01-{:02} {:02}:00:00", 1 + rng.next(5), rng.next(24));
            snapshot = snapshot.transfer(&format!("acc{}", from), &format!("acc{}", to), amount, &date);
        }
        MemoryGraph::new(snapshot).unwrap()
    }

    #[tokio::test]
    async fn test_deduction_keeps_ring_retaining_eighty_percent() {
        let graph = triangle(85.0);
        let found = rings(&graph, RingPolicy::Deduction).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start_account, "NUM-A");
        assert_eq!(found[0].hops, 3);
        assert_eq!(found[0].total_amount, 275.0);
    }

    #[tokio::test]
    async fn test_deduction_drops_ring_losing_too_much() {
        let graph = triangle(70.0);
        assert!(rings(&graph, RingPolicy::Deduction).await.is_empty());
        assert_eq!(rings(&graph, RingPolicy::Chronological).await.len(), 1);
    }

    #[tokio::test]
    async fn test_policies_nest_on_generated_graphs() {
        for seed in 1..=25 {
            let graph = random_graph(seed);
            let sets: Vec<HashSet<Vec<String>>> = {
                let mut sets = Vec::new();
                for policy in RingPolicy::ALL {
                    sets.push(rings(&graph, policy).await.iter().map(identity).collect());
                }
                sets
            };
            for pair in sets.windows(2) {
                assert!(pair[1].is_subset(&pair[0]), "seed {} broke nesting", seed);
            }
        }
    }

    #[tokio::test]
    async fn test_unique_rejects_repeated_interior_node() {
        // A -> B -> C -> D -> B -> A revisits B.
        let graph = MemoryGraph::new(
            GraphSnapshot::default()
                .account("A")
                .account("B")
                .account("C")
                .account("D")
                .transfer("A", "B", 10.0, "2024-01-01 01:00:00")
                .transfer("B", "C", 10.0, "2024-01-01 02:00:00")
                .transfer("C", "D", 10.0, "2024-01-01 03:00:00")
                .transfer("D", "B", 10.0, "2024-01-01 04:00:00")
                .transfer("B", "A", 10.0, "2024-01-01 05:00:00"),
        )
        .unwrap();
        let simple = rings(&graph, RingPolicy::Simple).await;
        assert!(simple.iter().any(|r| r.hops == 5));
        let unique = rings(&graph, RingPolicy::Unique).await;
        assert!(unique.iter().all(|r| r.hops == 3));
        assert!(unique.len() < simple.len());
    }

    #[tokio::test]
    async fn test_unparseable_date_fails_chronology() {
        let graph = MemoryGraph::new(
            GraphSnapshot::default()
                .account("A")
                .account("B")
                .account("C")
                .transfer("A", "B", 100.0, "2024-03-01T09:00:00")
                .transfer("B", "C", 95.0, "yesterday")
                .transfer("C", "A", 90.0, "2024-03-01T11:00:00"),
        )
        .unwrap();
        assert_eq!(rings(&graph, RingPolicy::Unique).await.len(), 3);
        assert!(rings(&graph, RingPolicy::Chronological).await.is_empty());
    }

    #[tokio::test]
    async fn test_order_is_deterministic() {
        let graph = random_graph(7);
        let first = rings(&graph, RingPolicy::Simple).await;
        let second = rings(&graph, RingPolicy::Simple).await;
        assert_eq!(first, second);
        for pair in first.windows(2) {
            assert!(pair[0].start_account <= pair[1].start_account);
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("robust".parse::<RingPolicy>().unwrap(), RingPolicy::Deduction);
        assert_eq!("Unique".parse::<RingPolicy>().unwrap(), RingPolicy::Unique);
        assert!("loose".parse::<RingPolicy>().is_err());
    }
}
