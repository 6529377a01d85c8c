//! Fraud analytics over a [`GraphStore`].
//!
//! Each report is independent: one bounded store round-trip, then filtering
//! and ranking in process.

pub mod cascade;
pub mod clustering;
pub mod customers;
pub mod outliers;
pub mod rings;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AnalyticsConfig;
use crate::error::{ClusterError, FraudError, FraudResult};
use crate::store::{ChainScan, CycleScan, GraphStore};

pub use cascade::CascadeChain;
pub use clustering::{Clusterer, ClusteringResult, TransactionFeature};
pub use customers::{AnomalousCustomer, AnomalyPolicy, AnomalyPolicyName, HighRiskCustomer};
pub use outliers::{AmountOutlier, TimeOutlier};
pub use rings::{FraudRing, RingPolicy};

/// Entry point for the fraud reports.
pub struct Analytics {
    store: Arc<dyn GraphStore>,
    clusterer: Arc<dyn Clusterer>,
    config: AnalyticsConfig,
}

impl Analytics {
    pub fn new(
        store: Arc<dyn GraphStore>,
        clusterer: Arc<dyn Clusterer>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            store,
            clusterer,
            config,
        }
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    /// Run a store call under the configured query timeout.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> FraudResult<T>
    where
        F: Future<Output = FraudResult<T>>,
    {
        let after = self.config.query_timeout();
        match tokio::time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout_secs = after.as_secs(), "Graph query timed out");
                Err(FraudError::Timeout { operation, after })
            }
        }
    }

    /// Transfer cycles admitted by `policy`.
    pub async fn fraud_rings(&self, policy: RingPolicy) -> FraudResult<Vec<FraudRing>> {
        let cfg = &self.config.rings;
        let scan = CycleScan {
            policy,
            min_hops: cfg.min_hops,
            max_hops: cfg.max_hops,
            retention_ratio: cfg.retention_ratio,
            limit: cfg.scan_limit,
        };
        let candidates = self
            .bounded("fraud_rings", self.store.transfer_cycles(&scan))
            .await?;
        if candidates.len() >= cfg.scan_limit {
            tracing::warn!(
                policy = %policy,
                scan_limit = cfg.scan_limit,
                "Ring scan hit its limit; results may be incomplete"
            );
        }
        let rings = rings::detect(candidates, policy, cfg.retention_ratio, cfg.max_results);
        tracing::info!(policy = %policy, count = rings.len(), "Fraud rings detected");
        Ok(rings)
    }

    pub async fn amount_outliers(&self) -> FraudResult<Vec<AmountOutlier>> {
        let transfers = self
            .bounded("amount_outliers", self.store.owned_transfers(None))
            .await?;
        let flagged = outliers::amount_outliers(&transfers, &self.config.outliers);
        tracing::info!(scanned = transfers.len(), count = flagged.len(), "Amount outliers computed");
        Ok(flagged)
    }

    pub async fn time_outliers(&self) -> FraudResult<Vec<TimeOutlier>> {
        let transfers = self
            .bounded("time_outliers", self.store.owned_transfers(None))
            .await?;
        let flagged = outliers::time_outliers(&transfers, &self.config.outliers);
        tracing::info!(scanned = transfers.len(), count = flagged.len(), "Time outliers computed");
        Ok(flagged)
    }

    pub async fn cascade_chains(&self) -> FraudResult<Vec<CascadeChain>> {
        let cfg = &self.config.cascade;
        let scan = ChainScan {
            min_hops: cfg.min_hops,
            max_hops: cfg.max_hops,
            limit: cfg.scan_limit,
        };
        let paths = self
            .bounded("cascade_chains", self.store.transfer_chains(&scan))
            .await?;
        let chains = cascade::rank(paths, cfg.limit);
        tracing::info!(count = chains.len(), "Cascade chains ranked");
        Ok(chains)
    }

    /// Customers flagged by the named policy, or the configured default.
    pub async fn anomalous_customers(
        &self,
        policy: Option<AnomalyPolicyName>,
    ) -> FraudResult<Vec<AnomalousCustomer>> {
        let cfg = &self.config.anomaly;
        let name = policy.unwrap_or(cfg.default_policy);
        let transfers = self
            .bounded("anomalous_customers", self.store.owned_transfers(None))
            .await?;
        let flagged = customers::anomalous_customers(&transfers, cfg.policy(name), cfg.limit);
        tracing::info!(policy = %name, count = flagged.len(), "Anomalous customers scored");
        Ok(flagged)
    }

    pub async fn high_risk_customers(&self) -> FraudResult<Vec<HighRiskCustomer>> {
        let limit = self.config.high_risk_limit;
        let flagged = self
            .bounded("high_risk_customers", self.store.flagged_customers(limit))
            .await?;
        Ok(customers::high_risk(flagged, limit))
    }

    /// Sample transfers, extract features and forward them to the clusterer.
    pub async fn kmeans_clustering(&self) -> FraudResult<ClusteringResult> {
        let sample = self.config.clustering.sample_size;
        let transfers = self
            .bounded("kmeans_clustering", self.store.owned_transfers(Some(sample)))
            .await?;
        let features = clustering::extract_features(&transfers);
        if features.is_empty() {
            tracing::info!("No transfers to cluster");
            return Ok(ClusteringResult::empty());
        }

        let after: Duration = self.config.clustering_timeout();
        tracing::debug!(features = features.len(), "Requesting clustering");
        let result = match tokio::time::timeout(after, self.clusterer.cluster(&features)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Clustering failed");
                return Err(e.into());
            }
            Err(_) => {
                tracing::error!(timeout_secs = after.as_secs(), "Clustering timed out");
                return Err(ClusterError::Timeout(after).into());
            }
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerSummary, OwnedTransfer, PathMatch};
    use crate::store::{GraphSnapshot, MemoryGraph};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingClusterer {
        calls: Mutex<Vec<Vec<TransactionFeature>>>,
    }

    #[async_trait]
    impl Clusterer for RecordingClusterer {
        async fn cluster(
            &self,
            features: &[TransactionFeature],
        ) -> Result<ClusteringResult, ClusterError> {
            self.calls.lock().unwrap().push(features.to_vec());
            let mut result = ClusteringResult::empty();
            result.inertia = Some(features.len() as f64);
            Ok(result)
        }
    }

    struct DownClusterer;

    #[async_trait]
    impl Clusterer for DownClusterer {
        async fn cluster(&self, _: &[TransactionFeature]) -> Result<ClusteringResult, ClusterError> {
            Err(ClusterError::Unavailable("connection refused".into()))
        }
    }

    /// Store whose every call hangs past any timeout.
    struct StalledStore;

    #[async_trait]
    impl GraphStore for StalledStore {
        async fn transfer_cycles(&self, _: &CycleScan) -> FraudResult<Vec<PathMatch>> {
            std::future::pending().await
        }
        async fn transfer_chains(&self, _: &ChainScan) -> FraudResult<Vec<PathMatch>> {
            std::future::pending().await
        }
        async fn owned_transfers(&self, _: Option<usize>) -> FraudResult<Vec<OwnedTransfer>> {
            std::future::pending().await
        }
        async fn flagged_customers(&self, _: usize) -> FraudResult<Vec<CustomerSummary>> {
            std::future::pending().await
        }
    }

    fn fixture() -> MemoryGraph {
        MemoryGraph::new(
            GraphSnapshot::default()
                .customer("c1", "Ana", "López")
                .customer("c2", "Luis", "Pérez")
                .account("A")
                .account("B")
                .account("C")
                .owns("c1", "A")
                .owns("c2", "B")
                .owns("c2", "C")
                .transfer("A", "B", 100.0, "2024-03-01 09:00:00")
                .transfer("B", "C", 90.0, "2024-03-01 10:00:00")
                .transfer("C", "A", 85.0, "2024-03-01 22:00:00")
                .transfer("A", "C", 40.0, "not-a-date"),
        )
        .unwrap()
    }

    fn analytics(clusterer: Arc<dyn Clusterer>) -> Analytics {
        Analytics::new(Arc::new(fixture()), clusterer, AnalyticsConfig::default())
    }

    #[tokio::test]
    async fn test_reports_are_idempotent() {
        let a = analytics(Arc::new(DownClusterer));
        assert_eq!(
            a.fraud_rings(RingPolicy::Simple).await.unwrap(),
            a.fraud_rings(RingPolicy::Simple).await.unwrap()
        );
        assert_eq!(a.time_outliers().await.unwrap(), a.time_outliers().await.unwrap());
        assert_eq!(a.cascade_chains().await.unwrap(), a.cascade_chains().await.unwrap());
    }

    #[tokio::test]
    async fn test_default_ring_policy_is_deduction() {
        let a = analytics(Arc::new(DownClusterer));
        let rings = a.fraud_rings(RingPolicy::default()).await.unwrap();
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].start_account, "NUM-A");
    }

    #[tokio::test]
    async fn test_clustering_skips_unparseable_dates() {
        let clusterer = Arc::new(RecordingClusterer {
            calls: Mutex::new(Vec::new()),
        });
        let a = analytics(clusterer.clone());
        let result = a.kmeans_clustering().await.unwrap();
        assert_eq!(result.inertia, Some(3.0));
        let calls = clusterer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].iter().any(|f| f.hour == 22));
    }

    #[tokio::test]
    async fn test_empty_sample_does_not_call_clusterer() {
        let clusterer = Arc::new(RecordingClusterer {
            calls: Mutex::new(Vec::new()),
        });
        let store = MemoryGraph::new(GraphSnapshot::default()).unwrap();
        let a = Analytics::new(Arc::new(store), clusterer.clone(), AnalyticsConfig::default());
        let result = a.kmeans_clustering().await.unwrap();
        assert!(result.clusters.is_empty());
        assert!(clusterer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clustering_failure_surfaces() {
        let a = analytics(Arc::new(DownClusterer));
        let err = a.kmeans_clustering().await.unwrap_err();
        assert!(matches!(err, FraudError::Clustering(ClusterError::Unavailable(_))));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_dense_snapshot_walk_times_out() {
        let ids: Vec<String> = (0..12).map(|i| format!("acc{:02}", i)).collect();
        let mut snapshot = GraphSnapshot::default();
        for id in &ids {
            snapshot = snapshot.account(id);
        }
        for from in &ids {
            for to in &ids {
                if from != to {
                    snapshot = snapshot.transfer(from, to, 100.0, "2024-03-01 09:00:00");
                }
            }
        }
        let mut config = AnalyticsConfig::default();
        config.query_timeout_secs = 1;
        config.cascade.max_hops = 8;
        let a = Analytics::new(
            Arc::new(MemoryGraph::new(snapshot).unwrap()),
            Arc::new(DownClusterer),
            config,
        );

        let started = std::time::Instant::now();
        let err = a.cascade_chains().await.unwrap_err();
        assert!(matches!(err, FraudError::Timeout { operation: "cascade_chains", .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_store_times_out() {
        let a = Analytics::new(
            Arc::new(StalledStore),
            Arc::new(DownClusterer),
            AnalyticsConfig::default(),
        );
        let err = a.cascade_chains().await.unwrap_err();
        assert!(matches!(err, FraudError::Timeout { operation: "cascade_chains", .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_anomaly_policy_override() {
        let a = analytics(Arc::new(DownClusterer));
        // c2 has two transfers [90, 85]: neither busy nor volatile.
        // c1 has [100, 40]: sd 30 < 0.5 * 70, also not flagged.
        assert!(a.anomalous_customers(None).await.unwrap().is_empty());
        assert!(a
            .anomalous_customers(Some(AnomalyPolicyName::Strict))
            .await
            .unwrap()
            .is_empty());
    }
}
