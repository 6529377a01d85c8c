//! Clustering gateway: feature extraction and the clustering capability.
//!
//! No clustering happens here. Transfers are reduced to `(amount, hour)`
//! features and handed to a [`Clusterer`], whose result is relayed as is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::ClusterError;
use crate::model::OwnedTransfer;
use crate::timestamp;

/// One transfer as seen by the clustering service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionFeature {
    pub amount: f64,
    pub hour: u32,
}

/// Response of the clustering service.
///
/// Older service builds omit `inertia` and `silhouette` and return outliers
/// as a flat list; both shapes are accepted and relayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub clusters: Vec<Value>,
    #[serde(default)]
    pub inertia: Option<f64>,
    #[serde(default)]
    pub silhouette: Option<f64>,
    #[serde(default)]
    pub cluster_summary: Vec<Value>,
    #[serde(default)]
    pub outliers: ClusterOutliers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterOutliers {
    ByCluster(BTreeMap<String, Vec<Value>>),
    Flat(Vec<Value>),
}

impl Default for ClusterOutliers {
    fn default() -> Self {
        ClusterOutliers::ByCluster(BTreeMap::new())
    }
}

impl ClusterOutliers {
    pub fn len(&self) -> usize {
        match self {
            ClusterOutliers::ByCluster(groups) => groups.values().map(Vec::len).sum(),
            ClusterOutliers::Flat(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClusteringResult {
    /// Result for an empty feature set.
    pub fn empty() -> Self {
        Self {
            clusters: Vec::new(),
            inertia: Some(0.0),
            silhouette: None,
            cluster_summary: Vec::new(),
            outliers: ClusterOutliers::default(),
        }
    }
}

/// Groups transaction features. Called once per request, never retried.
#[async_trait]
pub trait Clusterer: Send + Sync {
    async fn cluster(&self, features: &[TransactionFeature]) -> Result<ClusteringResult, ClusterError>;
}

/// Features for each transfer with a parseable date, in input order.
pub fn extract_features(transfers: &[OwnedTransfer]) -> Vec<TransactionFeature> {
    transfers
        .iter()
        .filter_map(|t| match timestamp::hour_of(&t.transaction_date) {
            Some(hour) => Some(TransactionFeature { amount: t.amount, hour }),
            None => {
                tracing::warn!(
                    customer = %t.customer_id,
                    date = %t.transaction_date,
                    "Transfer left out of clustering sample: unparseable date"
                );
                None
            }
        })
        .collect()
}
