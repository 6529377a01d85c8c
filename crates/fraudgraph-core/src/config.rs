//! Analytic tunables.
//!
//! Every field has a default, so an empty or partial TOML file is valid:
//!
//! ```toml
//! query_timeout_secs = 20
//!
//! [rings]
//! max_hops = 5
//!
//! [anomaly]
//! default_policy = "strict"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::analytics::customers::{AnomalyPolicy, AnomalyPolicyName};
use crate::error::{FraudError, FraudResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Upper bound for each store round-trip.
    pub query_timeout_secs: u64,
    pub rings: RingConfig,
    pub outliers: OutlierConfig,
    pub cascade: CascadeConfig,
    pub anomaly: AnomalyConfig,
    pub clustering: ClusteringConfig,
    /// Cap for the high-risk customer listing.
    pub high_risk_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            query_timeout_secs: 30,
            rings: RingConfig::default(),
            outliers: OutlierConfig::default(),
            cascade: CascadeConfig::default(),
            anomaly: AnomalyConfig::default(),
            clustering: ClusteringConfig::default(),
            high_risk_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    pub min_hops: usize,
    pub max_hops: usize,
    /// Minimum share of the previous hop's amount each hop must carry.
    pub retention_ratio: f64,
    /// Candidate paths fetched from the store per query.
    pub scan_limit: usize,
    pub max_results: usize,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            min_hops: 3,
            max_hops: 6,
            retention_ratio: 0.8,
            scan_limit: 10_000,
            max_results: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Standard deviations from the mean before an amount is flagged.
    pub sigma: f64,
    /// Transfers before this hour are off-hours.
    pub business_start_hour: u32,
    /// Transfers after this hour are off-hours.
    pub business_end_hour: u32,
    pub limit: usize,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            sigma: 2.0,
            business_start_hour: 8,
            business_end_hour: 20,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub min_hops: usize,
    pub max_hops: usize,
    pub scan_limit: usize,
    pub limit: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            min_hops: 2,
            max_hops: 5,
            scan_limit: 1_000,
            limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub default_policy: AnomalyPolicyName,
    pub strict: AnomalyPolicy,
    pub volatility: AnomalyPolicy,
    pub limit: usize,
}

impl AnomalyConfig {
    pub fn policy(&self, name: AnomalyPolicyName) -> &AnomalyPolicy {
        match name {
            AnomalyPolicyName::Strict => &self.strict,
            AnomalyPolicyName::Volatility => &self.volatility,
        }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            default_policy: AnomalyPolicyName::Volatility,
            strict: AnomalyPolicy::strict(),
            volatility: AnomalyPolicy::volatility(),
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Transfers sampled for feature extraction.
    pub sample_size: usize,
    pub timeout_secs: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            sample_size: 100,
            timeout_secs: 10,
        }
    }
}

impl AnalyticsConfig {
    /// Load from a TOML file and validate.
    pub fn load(path: &Path) -> FraudResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FraudError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text and validate.
    pub fn from_toml(content: &str) -> FraudResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| FraudError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    pub fn clustering_timeout(&self) -> Duration {
        Duration::from_secs(self.clustering.timeout_secs)
    }

    /// Reject settings the analytics cannot run with.
    pub fn validate(&self) -> FraudResult<()> {
        if self.query_timeout_secs == 0 {
            return Err(FraudError::Config("query_timeout_secs must be positive".into()));
        }
        check_hops("rings", self.rings.min_hops, self.rings.max_hops, 1)?;
        check_hops("cascade", self.cascade.min_hops, self.cascade.max_hops, 1)?;
        if !(self.rings.retention_ratio > 0.0 && self.rings.retention_ratio.is_finite()) {
            return Err(FraudError::Config("rings.retention_ratio must be positive".into()));
        }
        if !(self.outliers.sigma > 0.0 && self.outliers.sigma.is_finite()) {
            return Err(FraudError::Config("outliers.sigma must be positive".into()));
        }
        if self.outliers.business_start_hour > 23
            || self.outliers.business_end_hour > 23
            || self.outliers.business_start_hour > self.outliers.business_end_hour
        {
            return Err(FraudError::Config(
                "outliers business hours must satisfy 0 <= start <= end <= 23".into(),
            ));
        }
        for (name, policy) in [("strict", &self.anomaly.strict), ("volatility", &self.anomaly.volatility)] {
            if let Some(ratio) = policy.volatility_ratio {
                if !(ratio > 0.0 && ratio.is_finite()) {
                    return Err(FraudError::Config(format!(
                        "anomaly.{}.volatility_ratio must be positive",
                        name
                    )));
                }
            }
        }
        if self.clustering.timeout_secs == 0 {
            return Err(FraudError::Config("clustering.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

fn check_hops(section: &str, min: usize, max: usize, floor: usize) -> FraudResult<()> {
    if min < floor || min > max {
        return Err(FraudError::Config(format!(
            "{}: hop bounds must satisfy {} <= min_hops <= max_hops (got {}..{})",
            section, floor, min, max
        )));
    }
    Ok(())
}
