//! Graph and clustering service status.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use fraudgraph_ml::HttpClusterer;
use std::time::Duration;

use super::{GraphArgs, MlArgs};

#[derive(Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub graph: GraphArgs,

    #[command(flatten)]
    pub ml: MlArgs,
}

pub async fn execute(args: StatusArgs) -> Result<()> {
    println!("{}", "FraudGraph Status".bold());
    println!();

    match args.graph.connect().await {
        Ok(client) => {
            let counts = client.get_counts().await?;
            println!("  {}: {}", "Neo4j".bold(), "connected".green());
            println!("    Nodes:         {}", counts.nodes);
            println!("    Relationships: {}", counts.relationships);
            println!("    Transfers:     {}", counts.transfers);
        }
        Err(e) => {
            println!("  {}: {}", "Neo4j".bold(), "unavailable".red());
            println!("    {}", format!("{:#}", e).dimmed());
        }
    }

    let clusterer = HttpClusterer::new(&args.ml.ml_url, Duration::from_secs(5));
    let ml_status = if clusterer.health_check().await {
        "reachable".green()
    } else {
        "unreachable".red()
    };
    println!("  {}: {} ({})", "Clustering".bold(), ml_status, clusterer.base_url());

    Ok(())
}
