//! Customer-level scoring: anomalous transaction profiles and risk flags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::FraudError;
use crate::model::{full_name, CustomerSummary, OwnedTransfer};

/// Named threshold set for [`anomalous_customers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyPolicyName {
    Strict,
    Volatility,
}

impl fmt::Display for AnomalyPolicyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyPolicyName::Strict => f.write_str("strict"),
            AnomalyPolicyName::Volatility => f.write_str("volatility"),
        }
    }
}

impl FromStr for AnomalyPolicyName {
    type Err = FraudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(AnomalyPolicyName::Strict),
            "volatility" => Ok(AnomalyPolicyName::Volatility),
            other => Err(FraudError::validation(format!(
                "unknown anomaly policy '{}' (expected strict or volatility)",
                other
            ))),
        }
    }
}

/// A customer is anomalous when it has more than `min_transactions`
/// transfers totalling more than `min_total_amount`, or, when
/// `volatility_ratio` is set, when its standard deviation exceeds
/// `mean * volatility_ratio`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPolicy {
    pub min_transactions: usize,
    pub min_total_amount: f64,
    #[serde(default)]
    pub volatility_ratio: Option<f64>,
}

impl AnomalyPolicy {
    pub fn strict() -> Self {
        Self {
            min_transactions: 10,
            min_total_amount: 10_000.0,
            volatility_ratio: None,
        }
    }

    pub fn volatility() -> Self {
        Self {
            min_transactions: 5,
            min_total_amount: 5_000.0,
            volatility_ratio: Some(0.5),
        }
    }

    fn flags(&self, profile: &AnomalousCustomer) -> bool {
        let busy = profile.number_of_transactions > self.min_transactions
            && profile.total_amount > self.min_total_amount;
        let volatile = self
            .volatility_ratio
            .is_some_and(|ratio| profile.standard_deviation > profile.avg_amount * ratio);
        busy || volatile
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalousCustomer {
    pub customer: String,
    pub customer_name: String,
    pub number_of_transactions: usize,
    pub total_amount: f64,
    pub avg_amount: f64,
    /// Population standard deviation of the customer's amounts.
    pub standard_deviation: f64,
}

/// Build one transaction profile per customer and keep those `policy` flags,
/// ordered by total amount then standard deviation, both descending.
pub fn anomalous_customers(
    transfers: &[OwnedTransfer],
    policy: &AnomalyPolicy,
    limit: usize,
) -> Vec<AnomalousCustomer> {
    let mut by_customer: BTreeMap<&str, Vec<&OwnedTransfer>> = BTreeMap::new();
    for t in transfers {
        by_customer.entry(t.customer_id.as_str()).or_default().push(t);
    }

    let mut flagged: Vec<AnomalousCustomer> = by_customer
        .into_iter()
        .filter_map(|(customer, records)| {
            let first = records.first()?;
            let count = records.len();
            let total: f64 = records.iter().map(|t| t.amount).sum();
            let mean = total / count as f64;
            let variance = records
                .iter()
                .map(|t| (t.amount - mean).powi(2))
                .sum::<f64>()
                / count as f64;
            let profile = AnomalousCustomer {
                customer: customer.to_string(),
                customer_name: first.customer_name(),
                number_of_transactions: count,
                total_amount: total,
                avg_amount: mean,
                standard_deviation: variance.sqrt(),
            };
            policy.flags(&profile).then_some(profile)
        })
        .collect();

    flagged.sort_by(|a, b| {
        b.total_amount
            .total_cmp(&a.total_amount)
            .then_with(|| b.standard_deviation.total_cmp(&a.standard_deviation))
            .then_with(|| a.customer.cmp(&b.customer))
    });
    flagged.truncate(limit);
    flagged
}

/// Customer flagged high-risk or VIP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighRiskCustomer {
    pub customer: String,
    pub customer_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub is_high_risk: bool,
    #[serde(rename = "isVIP")]
    pub is_vip: bool,
}

impl From<CustomerSummary> for HighRiskCustomer {
    fn from(c: CustomerSummary) -> Self {
        Self {
            customer_name: full_name(c.first_name.as_deref(), c.last_name.as_deref()),
            customer: c.customer_id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            is_high_risk: c.is_high_risk,
            is_vip: c.is_vip,
        }
    }
}

/// Keep flagged customers, ordered by id, at most `limit`.
pub fn high_risk(customers: Vec<CustomerSummary>, limit: usize) -> Vec<HighRiskCustomer> {
    let mut flagged: Vec<CustomerSummary> = customers
        .into_iter()
        .filter(|c| c.is_high_risk || c.is_vip)
        .collect();
    flagged.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
    flagged.truncate(limit);
    flagged.into_iter().map(HighRiskCustomer::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfers(customer: &str, amounts: &[f64]) -> Vec<OwnedTransfer> {
        amounts
            .iter()
            .map(|&amount| OwnedTransfer {
                customer_id: customer.to_string(),
                first_name: Some("Luis".to_string()),
                last_name: Some("Pérez".to_string()),
                amount,
                transaction_date: "2024-01-01 10:00:00".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_population_statistics() {
        let records = transfers("c1", &[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let policy = AnomalyPolicy {
            min_transactions: 0,
            min_total_amount: 0.0,
            volatility_ratio: None,
        };
        let flagged = anomalous_customers(&records, &policy, 20);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].number_of_transactions, 8);
        assert_eq!(flagged[0].total_amount, 40.0);
        assert_eq!(flagged[0].avg_amount, 5.0);
        assert_eq!(flagged[0].standard_deviation, 2.0);
        assert_eq!(flagged[0].customer_name, "Luis Pérez");
    }

    #[test]
    fn test_policies_disagree_on_same_customers() {
        // steady: 6 transfers of 1000 -> busy under volatility only
        // erratic: 3 transfers, sd well above half the mean -> volatile
        let mut records = transfers("steady", &[1000.0; 6]);
        records.extend(transfers("erratic", &[10.0, 10.0, 2000.0]));

        let strict = anomalous_customers(&records, &AnomalyPolicy::strict(), 20);
        assert!(strict.is_empty());

        let volatility = anomalous_customers(&records, &AnomalyPolicy::volatility(), 20);
        let ids: Vec<&str> = volatility.iter().map(|c| c.customer.as_str()).collect();
        assert_eq!(ids, vec!["steady", "erratic"]);
    }

    #[test]
    fn test_strict_requires_both_count_and_total() {
        let mut records = transfers("many_small", &[10.0; 20]);
        records.extend(transfers("big", &[2000.0; 11]));
        let strict = anomalous_customers(&records, &AnomalyPolicy::strict(), 20);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[0].customer, "big");
    }

    #[test]
    fn test_ties_broken_by_deviation() {
        let mut records = transfers("flat", &[500.0, 500.0]);
        records.extend(transfers("spiky", &[100.0, 900.0]));
        let policy = AnomalyPolicy {
            min_transactions: 1,
            min_total_amount: 0.0,
            volatility_ratio: None,
        };
        let flagged = anomalous_customers(&records, &policy, 20);
        assert_eq!(flagged[0].customer, "spiky");
        assert_eq!(flagged[1].customer, "flat");
    }

    #[test]
    fn test_high_risk_filters_and_orders() {
        let customer = |id: &str, risk: bool, vip: bool| CustomerSummary {
            customer_id: id.to_string(),
            first_name: Some("Eva".to_string()),
            last_name: None,
            email: None,
            is_high_risk: risk,
            is_vip: vip,
        };
        let listed = high_risk(
            vec![
                customer("c3", true, false),
                customer("c1", false, true),
                customer("c2", false, false),
            ],
            20,
        );
        let ids: Vec<&str> = listed.iter().map(|c| c.customer.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c3"]);
        assert_eq!(listed[0].customer_name, "Eva");
    }

    #[test]
    fn test_policy_name_parsing() {
        assert_eq!("STRICT".parse::<AnomalyPolicyName>().unwrap(), AnomalyPolicyName::Strict);
        assert!("lenient".parse::<AnomalyPolicyName>().is_err());
    }
}
