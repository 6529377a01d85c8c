//! Terminal output formatting.

use colored::Colorize;
use fraudgraph_core::analytics::{
    AmountOutlier, AnomalousCustomer, CascadeChain, ClusteringResult, FraudRing, HighRiskCustomer,
    TimeOutlier,
};
use fraudgraph_core::model::AccountNode;

fn account_label(node: &AccountNode) -> &str {
    node.account_number
        .as_deref()
        .or(node.account_id.as_deref())
        .unwrap_or("?")
}

fn route(nodes: &[AccountNode]) -> String {
    nodes.iter().map(account_label).collect::<Vec<_>>().join(" → ")
}

/// Print rings as a table.
pub fn print_rings(rings: &[FraudRing]) {
    if rings.is_empty() {
        println!("{}", "No fraud rings found.".dimmed());
        return;
    }

    println!("{:<16} {:>4} {:>14}  {}", "Start", "Hops", "Total", "Route");
    println!("{}", "─".repeat(80));
    for ring in rings {
        println!(
            "{:<16} {:>4} {:>14.2}  {}",
            truncate(&ring.start_account, 16),
            ring.hops,
            ring.total_amount,
            route(&ring.nodes).dimmed()
        );
    }
    println!();
    println!("{} ring(s)", rings.len());
}

pub fn print_amount_outliers(outliers: &[AmountOutlier]) {
    if outliers.is_empty() {
        println!("{}", "No amount outliers found.".dimmed());
        return;
    }

    println!(
        "{:<24} {:>12} {:>12} {:>10} {:>12}  {}",
        "Customer", "Amount", "Mean", "Std dev", "Deviation", "Date"
    );
    println!("{}", "─".repeat(100));
    for o in outliers {
        let deviation = format!("{:+.2}", o.deviation);
        println!(
            "{:<24} {:>12.2} {:>12.2} {:>10.2} {:>12}  {}",
            truncate(&o.customer_name, 24),
            o.amount,
            o.avg_amount,
            o.std_dev,
            if o.deviation > 0.0 { deviation.red() } else { deviation.yellow() },
            o.transaction_date.dimmed()
        );
    }
}

pub fn print_time_outliers(outliers: &[TimeOutlier]) {
    if outliers.is_empty() {
        println!("{}", "No time outliers found.".dimmed());
        return;
    }

    println!("{:<24} {:>12} {:>5}  {}", "Customer", "Amount", "Hour", "Date");
    println!("{}", "─".repeat(70));
    for o in outliers {
        println!(
            "{:<24} {:>12.2} {:>5}  {}",
            truncate(&o.customer_name, 24),
            o.amount,
            format!("{:02}h", o.hour).yellow(),
            o.date.dimmed()
        );
    }
}

pub fn print_chains(chains: &[CascadeChain]) {
    if chains.is_empty() {
        println!("{}", "No cascade chains found.".dimmed());
        return;
    }

    println!("{:<16} {:<16} {:>4} {:>14}", "Start", "End", "Hops", "Transferred");
    println!("{}", "─".repeat(55));
    for chain in chains {
        println!(
            "{:<16} {:<16} {:>4} {:>14.2}",
            truncate(&chain.start_account, 16),
            truncate(&chain.end_account, 16),
            chain.hops,
            chain.total_transferred
        );
    }
}

pub fn print_anomalous(customers: &[AnomalousCustomer]) {
    if customers.is_empty() {
        println!("{}", "No anomalous customers found.".dimmed());
        return;
    }

    println!(
        "{:<24} {:>6} {:>14} {:>12} {:>12}",
        "Customer", "Txns", "Total", "Mean", "Std dev"
    );
    println!("{}", "─".repeat(72));
    for c in customers {
        println!(
            "{:<24} {:>6} {:>14.2} {:>12.2} {:>12.2}",
            truncate(&c.customer_name, 24),
            c.number_of_transactions,
            c.total_amount,
            c.avg_amount,
            c.standard_deviation
        );
    }
}

pub fn print_high_risk(customers: &[HighRiskCustomer]) {
    if customers.is_empty() {
        println!("{}", "No high-risk customers found.".dimmed());
        return;
    }

    println!("{:<16} {:<28} {:<30} {}", "ID", "Name", "Email", "Flags");
    println!("{}", "─".repeat(85));
    for c in customers {
        let mut flags = Vec::new();
        if c.is_high_risk {
            flags.push("high-risk".red().to_string());
        }
        if c.is_vip {
            flags.push("vip".cyan().to_string());
        }
        println!(
            "{:<16} {:<28} {:<30} {}",
            truncate(&c.customer, 16),
            truncate(&c.customer_name, 28),
            truncate(c.email.as_deref().unwrap_or("-"), 30),
            flags.join(" ")
        );
    }
}

pub fn print_clustering(result: &ClusteringResult) {
    if result.clusters.is_empty() {
        println!("{}", "No transactions to cluster.".dimmed());
        return;
    }

    println!("  Points:     {}", result.clusters.len());
    if let Some(inertia) = result.inertia {
        println!("  Inertia:    {:.3}", inertia);
    }
    if let Some(silhouette) = result.silhouette {
        println!("  Silhouette: {:.3}", silhouette);
    }
    println!("  Outliers:   {}", result.outliers.len());
    for summary in &result.cluster_summary {
        println!("  {}", summary.to_string().dimmed());
    }
}

/// Truncate to `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("López", 5), "López");
        assert_eq!(truncate("María Fernández", 6), "María…");
    }

    #[test]
    fn test_route_prefers_account_number() {
        let nodes = vec![
            AccountNode {
                account_id: Some("A".into()),
                account_number: Some("NUM-A".into()),
                ..Default::default()
            },
            AccountNode {
                account_id: Some("B".into()),
                ..Default::default()
            },
        ];
        assert_eq!(route(&nodes), "NUM-A → B");
    }
}
