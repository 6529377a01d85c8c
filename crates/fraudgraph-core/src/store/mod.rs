//! Graph store capability used by the analytics.
//!
//! The analytics never talk to Neo4j directly: they ask a [`GraphStore`]
//! for matched paths and flat transfer records, then do all constraint
//! checking and ranking themselves. `fraudgraph-graph` provides the Neo4j
//! implementation; [`MemoryGraph`] runs the same contract in process.

pub mod memory;

use async_trait::async_trait;

use crate::analytics::rings::RingPolicy;
use crate::error::FraudResult;
use crate::model::{CustomerSummary, OwnedTransfer, PathMatch};

pub use memory::{GraphSnapshot, MemoryGraph};

/// Request for transfer cycles returning to their start account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleScan {
    /// Constraints the store may apply server-side to prune candidates.
    /// Implementations are free to ignore it.
    pub policy: RingPolicy,
    pub min_hops: usize,
    pub max_hops: usize,
    pub retention_ratio: f64,
    pub limit: usize,
}

/// Request for transfer paths between two distinct accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainScan {
    pub min_hops: usize,
    pub max_hops: usize,
    /// Implementations that truncate should keep the highest-total paths.
    pub limit: usize,
}

/// Read-only pattern queries over the fraud graph.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Paths `(a:Account)-[:transfers*min..max]->(a)`.
    async fn transfer_cycles(&self, scan: &CycleScan) -> FraudResult<Vec<PathMatch>>;

    /// Paths `(a:Account)-[:transfers*min..max]->(b:Account)` with `a <> b`.
    async fn transfer_chains(&self, scan: &ChainScan) -> FraudResult<Vec<PathMatch>>;

    /// Outgoing transfers of every customer-owned account, one record per
    /// (owner, transfer) pair. `limit` caps the number of records.
    async fn owned_transfers(&self, limit: Option<usize>) -> FraudResult<Vec<OwnedTransfer>>;

    /// Customers with `isHighRisk` or `isVIP` set, ordered by customer id.
    async fn flagged_customers(&self, limit: usize) -> FraudResult<Vec<CustomerSummary>>;
}
