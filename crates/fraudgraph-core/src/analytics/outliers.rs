//! Amount and off-hours transfer outliers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::OutlierConfig;
use crate::model::OwnedTransfer;
use crate::timestamp;

/// A transfer far from its owner's mean amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountOutlier {
    pub customer: String,
    pub customer_name: String,
    pub amount: f64,
    pub avg_amount: f64,
    pub std_dev: f64,
    /// Absolute distance from the mean.
    pub deviation: f64,
    pub transaction_date: String,
}

/// A transfer made outside business hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeOutlier {
    pub customer: String,
    pub customer_name: String,
    pub amount: f64,
    /// Date exactly as stored.
    pub date: String,
    pub hour: u32,
}

/// Mean and sample standard deviation. `None` for fewer than two values.
pub(crate) fn sample_stats(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Flag transfers more than `sigma` standard deviations from the owner's
/// mean. Owners with a single transfer or identical amounts are skipped.
pub fn amount_outliers(transfers: &[OwnedTransfer], config: &OutlierConfig) -> Vec<AmountOutlier> {
    let mut by_customer: BTreeMap<&str, Vec<&OwnedTransfer>> = BTreeMap::new();
    for t in transfers {
        by_customer.entry(t.customer_id.as_str()).or_default().push(t);
    }

    let mut flagged = Vec::new();
    for (customer, records) in by_customer {
        let amounts: Vec<f64> = records.iter().map(|t| t.amount).collect();
        let Some((mean, std_dev)) = sample_stats(&amounts) else {
            continue;
        };
        if std_dev <= 0.0 {
            continue;
        }
        let threshold = config.sigma * std_dev;
        for t in records {
            let deviation = (t.amount - mean).abs();
            if deviation > threshold {
                flagged.push(AmountOutlier {
                    customer: customer.to_string(),
                    customer_name: t.customer_name(),
                    amount: t.amount,
                    avg_amount: mean,
                    std_dev,
                    deviation,
                    transaction_date: t.transaction_date.clone(),
                });
            }
        }
    }

    flagged.sort_by(|a, b| {
        b.deviation
            .total_cmp(&a.deviation)
            .then_with(|| a.customer.cmp(&b.customer))
            .then_with(|| a.transaction_date.cmp(&b.transaction_date))
    });
    flagged.truncate(config.limit);
    flagged
}

/// Flag transfers whose hour falls before `business_start_hour` or after
/// `business_end_hour`.
pub fn time_outliers(transfers: &[OwnedTransfer], config: &OutlierConfig) -> Vec<TimeOutlier> {
    let mut flagged: Vec<TimeOutlier> = transfers
        .iter()
        .filter_map(|t| {
            let Some(hour) = timestamp::hour_of(&t.transaction_date) else {
                tracing::warn!(
                    customer = %t.customer_id,
                    date = %t.transaction_date,
                    "Skipping transfer with unparseable date"
                );
                return None;
            };
            (hour < config.business_start_hour || hour > config.business_end_hour).then(|| {
                TimeOutlier {
                    customer: t.customer_id.clone(),
                    customer_name: t.customer_name(),
                    amount: t.amount,
                    date: t.transaction_date.clone(),
                    hour,
                }
            })
        })
        .collect();

    flagged.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.customer.cmp(&b.customer))
            .then_with(|| a.date.cmp(&b.date))
    });
    flagged.truncate(config.limit);
    flagged
}
