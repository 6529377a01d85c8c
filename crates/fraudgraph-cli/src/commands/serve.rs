//! Web server command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use fraudgraph_core::config::AnalyticsConfig;
use fraudgraph_web::AppState;
use std::path::PathBuf;
use std::sync::Arc;

use super::{open_analytics, GraphArgs, MlArgs};

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "3000")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Serve analytics from a JSON graph snapshot; entity endpoints are disabled
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    #[command(flatten)]
    pub graph: GraphArgs,

    #[command(flatten)]
    pub ml: MlArgs,
}

pub async fn execute(args: ServeArgs, config: AnalyticsConfig) -> Result<()> {
    let (analytics, client) =
        open_analytics(args.fixture.as_deref(), &args.graph, &args.ml, config).await?;
    let source = match (&args.fixture, &args.graph.neo4j_uri) {
        (Some(path), _) => path.display().to_string(),
        (None, Some(uri)) => uri.clone(),
        (None, None) => String::new(),
    };
    let state = AppState::new(Arc::new(analytics), client);

    println!();
    println!("  {} {}", "FraudGraph".cyan().bold(), "API Server".bold());
    println!();
    println!("  {}        http://{}:{}/api/analytics", "API".green(), args.host, args.port);
    if state.graph.is_some() {
        println!("  {}   http://{}:{}/api/nodes", "Entities".green(), args.host, args.port);
    } else {
        println!("  {}   {}", "Entities".yellow(), "disabled (fixture mode)".dimmed());
    }
    println!("  {}      {}", "Graph".green(), source);
    println!("  {} {}", "Clustering".green(), args.ml.ml_url);
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    fraudgraph_web::run_server(state, &args.host, args.port).await?;

    Ok(())
}
