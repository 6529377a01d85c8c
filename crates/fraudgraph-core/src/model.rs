//! Graph records exchanged between the store and the analytics.
//!
//! These are the property sets of matched nodes and edges, shaped the way
//! the HTTP layer serializes them (camelCase field names).

use serde::{Deserialize, Serialize};

use crate::timestamp::{self, TransactionTime};

/// An `Account` node as it appears along a matched path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountNode {
    /// Store-level node identity, used for the repeated-node constraint.
    #[serde(default, skip_serializing)]
    pub key: String,
    pub account_id: Option<String>,
    pub account_number: Option<String>,
    pub account_type: Option<String>,
    pub balance: Option<f64>,
    pub currency: Option<String>,
    pub created_at: Option<String>,
}

impl AccountNode {
    /// Label used when presenting the account: number, then id, then key.
    pub fn display_name(&self) -> &str {
        self.account_number
            .as_deref()
            .or(self.account_id.as_deref())
            .unwrap_or(&self.key)
    }
}

/// A `transfers` edge instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEdge {
    #[serde(default, skip_serializing)]
    pub key: String,
    pub amount: f64,
    pub currency: Option<String>,
    pub transaction_date: String,
    pub is_international: Option<bool>,
}

impl TransferEdge {
    pub fn time(&self) -> Option<TransactionTime> {
        timestamp::parse(&self.transaction_date)
    }
}

/// A directed path through `transfers` edges.
///
/// `nodes.len() == transfers.len() + 1`; `transfers[i]` leads from
/// `nodes[i]` to `nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathMatch {
    pub nodes: Vec<AccountNode>,
    pub transfers: Vec<TransferEdge>,
}

impl PathMatch {
    pub fn hops(&self) -> usize {
        self.transfers.len()
    }

    pub fn start(&self) -> Option<&AccountNode> {
        self.nodes.first()
    }

    pub fn end(&self) -> Option<&AccountNode> {
        self.nodes.last()
    }

    /// Sum of the hop amounts along the path.
    pub fn total_amount(&self) -> f64 {
        self.transfers.iter().map(|t| t.amount).sum()
    }

    /// Whether the path is well formed (edge/node counts line up).
    pub fn is_consistent(&self) -> bool {
        !self.transfers.is_empty() && self.nodes.len() == self.transfers.len() + 1
    }
}

/// One outgoing transfer of an account owned by a customer.
///
/// A transfer from a jointly owned account yields one record per owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnedTransfer {
    pub customer_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub amount: f64,
    pub transaction_date: String,
}

impl OwnedTransfer {
    pub fn customer_name(&self) -> String {
        full_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

/// Customer identity and risk flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub customer_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub is_high_risk: bool,
    #[serde(default, rename = "isVIP")]
    pub is_vip: bool,
}

pub(crate) fn full_name(first: Option<&str>, last: Option<&str>) -> String {
    match (first, last) {
        (Some(f), Some(l)) => format!("{} {}", f, l),
        (Some(f), None) => f.to_string(),
        (None, Some(l)) => l.to_string(),
        (None, None) => String::new(),
    }
}
