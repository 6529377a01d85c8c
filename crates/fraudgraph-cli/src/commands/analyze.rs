//! Offline and live analytic reports.

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use fraudgraph_core::analytics::{Analytics, AnomalyPolicyName, RingPolicy};
use fraudgraph_core::config::AnalyticsConfig;
use fraudgraph_web::routes::Envelope;
use serde::Serialize;
use std::path::PathBuf;

use super::{open_analytics, GraphArgs, MlArgs};
use crate::output;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Report {
    FraudRings,
    AmountOutliers,
    TimeOutliers,
    CascadeChains,
    AnomalousCustomers,
    HighRiskCustomers,
    KmeansClustering,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Report to run
    #[arg(value_enum)]
    pub report: Report,

    /// Run against a JSON graph snapshot instead of Neo4j
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Ring policy (simple, unique, chronological, deduction) or anomaly
    /// policy (strict, volatility)
    #[arg(long)]
    pub policy: Option<String>,

    /// Print the JSON body the API would return
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub graph: GraphArgs,

    #[command(flatten)]
    pub ml: MlArgs,
}

pub async fn execute(args: AnalyzeArgs, config: AnalyticsConfig) -> Result<()> {
    if args.policy.is_some()
        && !matches!(args.report, Report::FraudRings | Report::AnomalousCustomers)
    {
        bail!("--policy only applies to fraud-rings and anomalous-customers");
    }

    let (analytics, _client) =
        open_analytics(args.fixture.as_deref(), &args.graph, &args.ml, config).await?;
    run(&analytics, args.report, args.policy.as_deref(), args.json).await
}

async fn run(analytics: &Analytics, report: Report, policy: Option<&str>, json: bool) -> Result<()> {
    match report {
        Report::FraudRings => {
            let policy = policy.map(str::parse::<RingPolicy>).transpose()?.unwrap_or_default();
            let rings = analytics.fraud_rings(policy).await?;
            if json {
                return print_json("rings", rings);
            }
            println!("{} {}", "Fraud rings".bold(), format!("({})", policy).dimmed());
            output::print_rings(&rings);
        }
        Report::AmountOutliers => {
            let outliers = analytics.amount_outliers().await?;
            if json {
                return print_json("outliers", outliers);
            }
            println!("{}", "Amount outliers".bold());
            output::print_amount_outliers(&outliers);
        }
        Report::TimeOutliers => {
            let outliers = analytics.time_outliers().await?;
            if json {
                return print_json("outliers", outliers);
            }
            println!("{}", "Time outliers".bold());
            output::print_time_outliers(&outliers);
        }
        Report::CascadeChains => {
            let chains = analytics.cascade_chains().await?;
            if json {
                return print_json("chains", chains);
            }
            println!("{}", "Cascade chains".bold());
            output::print_chains(&chains);
        }
        Report::AnomalousCustomers => {
            let name = policy.map(str::parse::<AnomalyPolicyName>).transpose()?;
            let customers = analytics.anomalous_customers(name).await?;
            if json {
                return print_json("customers", customers);
            }
            let shown = name.unwrap_or(analytics.config().anomaly.default_policy);
            println!("{} {}", "Anomalous customers".bold(), format!("({})", shown).dimmed());
            output::print_anomalous(&customers);
        }
        Report::HighRiskCustomers => {
            let customers = analytics.high_risk_customers().await?;
            if json {
                return print_json("customers", customers);
            }
            println!("{}", "High-risk customers".bold());
            output::print_high_risk(&customers);
        }
        Report::KmeansClustering => {
            let result = analytics.kmeans_clustering().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }
            println!("{}", "K-means clustering".bold());
            output::print_clustering(&result);
        }
    }
    Ok(())
}

/// Same envelope the HTTP API returns.
fn print_json<T: Serialize>(name: &'static str, items: Vec<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&Envelope::new(name, items))?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fraudgraph_core::store::{GraphSnapshot, MemoryGraph};
    use fraudgraph_ml::HttpClusterer;
    use std::sync::Arc;
    use std::time::Duration;

    fn analytics() -> Analytics {
        let graph = MemoryGraph::new(
            GraphSnapshot::default()
                .customer("c1", "Ana", "López")
                .account("A")
                .account("B")
                .owns("c1", "A")
                .transfer("A", "B", 100.0, "2024-03-01 09:00:00")
                .transfer("B", "A", 95.0, "2024-03-01 10:00:00"),
        )
        .unwrap();
        let clusterer = HttpClusterer::new("http://127.0.0.1:9", Duration::from_millis(100));
        Analytics::new(Arc::new(graph), Arc::new(clusterer), AnalyticsConfig::default())
    }

    #[tokio::test]
    async fn test_reports_run_offline() {
        let analytics = analytics();
        for report in [
            Report::FraudRings,
            Report::AmountOutliers,
            Report::TimeOutliers,
            Report::CascadeChains,
            Report::HighRiskCustomers,
        ] {
            run(&analytics, report, None, true).await.unwrap();
        }
        run(&analytics, Report::AnomalousCustomers, Some("strict"), false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bad_policy_rejected() {
        let err = run(&analytics(), Report::FraudRings, Some("loose"), false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("loose"));
    }
}
