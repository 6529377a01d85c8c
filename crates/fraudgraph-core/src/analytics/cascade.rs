//! Multi-hop transfer chains between distinct accounts.

use serde::{Deserialize, Serialize};

use crate::model::{AccountNode, PathMatch};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeChain {
    pub start_account: String,
    pub end_account: String,
    pub total_transferred: f64,
    pub hops: usize,
    pub accounts: Vec<AccountNode>,
}

/// Rank open paths by total transferred amount, descending, keeping `limit`.
/// Paths that return to their start are dropped.
pub fn rank(paths: Vec<PathMatch>, limit: usize) -> Vec<CascadeChain> {
    let mut chains: Vec<CascadeChain> = paths
        .into_iter()
        .filter(|p| p.is_consistent())
        .filter_map(|p| {
            let (start, end) = (p.start()?, p.end()?);
            if start.key == end.key {
                return None;
            }
            Some(CascadeChain {
                start_account: start.display_name().to_string(),
                end_account: end.display_name().to_string(),
                total_transferred: p.total_amount(),
                hops: p.hops(),
                accounts: p.nodes,
            })
        })
        .collect();

    chains.sort_by(|a, b| {
        b.total_transferred
            .total_cmp(&a.total_transferred)
            .then_with(|| a.start_account.cmp(&b.start_account))
            .then_with(|| a.hops.cmp(&b.hops))
    });
    chains.truncate(limit);
    chains
}
