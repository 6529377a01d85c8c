//! CLI command definitions and handlers.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fraudgraph_core::analytics::Analytics;
use fraudgraph_core::config::AnalyticsConfig;
use fraudgraph_core::store::{GraphSnapshot, GraphStore, MemoryGraph};
use fraudgraph_graph::{GraphClient, GraphConfig, Neo4jStore};
use fraudgraph_ml::{HttpClusterer, DEFAULT_ML_URL};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod analyze;
pub mod schema;
pub mod serve;
pub mod status;

/// FraudGraph - Graph analytics for financial fraud
#[derive(Parser)]
#[command(name = "fraudgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Analytic tunables (TOML)
    #[arg(short, long, global = true, env = "FRAUDGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve(serve::ServeArgs),

    /// Run one analytic report and print it
    Analyze(analyze::AnalyzeArgs),

    /// Create the graph constraints and indexes
    Schema(schema::SchemaArgs),

    /// Show graph and clustering service status
    Status(status::StatusArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;

        match self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Analyze(args) => analyze::execute(args, config).await,
            Commands::Schema(args) => schema::execute(args).await,
            Commands::Status(args) => status::execute(args).await,
        }
    }
}

/// Neo4j connection settings.
#[derive(Args, Debug, Clone)]
pub struct GraphArgs {
    /// Bolt URI, e.g. neo4j://localhost:7687
    #[arg(long, env = "NEO4J_URI")]
    pub neo4j_uri: Option<String>,

    #[arg(long, env = "NEO4J_USER")]
    pub neo4j_user: Option<String>,

    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    pub neo4j_password: Option<String>,

    /// Database name (server default when unset)
    #[arg(long, env = "NEO4J_DATABASE")]
    pub neo4j_database: Option<String>,

    #[arg(long, env = "NEO4J_MAX_CONNECTIONS", default_value = "16")]
    pub neo4j_max_connections: usize,
}

impl GraphArgs {
    /// Connection config; every credential must be present.
    pub fn graph_config(&self) -> Result<GraphConfig> {
        fn required(value: &Option<String>, var: &str) -> Result<String> {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} is not set", var))
        }

        let mut config = GraphConfig::new(
            required(&self.neo4j_uri, "NEO4J_URI")?,
            required(&self.neo4j_user, "NEO4J_USER")?,
            required(&self.neo4j_password, "NEO4J_PASSWORD")?,
        );
        config.database = self.neo4j_database.clone();
        config.max_connections = self.neo4j_max_connections;
        Ok(config)
    }

    pub async fn connect(&self) -> Result<GraphClient> {
        let config = self.graph_config()?;
        let client = GraphClient::connect(&config)
            .await
            .with_context(|| format!("Failed to connect to Neo4j at {}", config.uri))?;
        tracing::info!(uri = %config.uri, "Connected to Neo4j");
        Ok(client)
    }
}

/// Clustering service settings.
#[derive(Args, Debug, Clone)]
pub struct MlArgs {
    /// Clustering service base URL
    #[arg(long, env = "FRAUDGRAPH_ML_URL", default_value = DEFAULT_ML_URL)]
    pub ml_url: String,
}

pub fn load_config(path: Option<&Path>) -> Result<AnalyticsConfig> {
    match path {
        Some(path) => {
            let config = AnalyticsConfig::load(path)
                .with_context(|| format!("Invalid config file {}", path.display()))?;
            tracing::debug!(path = %path.display(), "Loaded analytics config");
            Ok(config)
        }
        None => Ok(AnalyticsConfig::default()),
    }
}

pub fn load_fixture(path: &Path) -> Result<MemoryGraph> {
    let snapshot = GraphSnapshot::load(path)
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    let graph = MemoryGraph::new(snapshot)
        .with_context(|| format!("Invalid fixture {}", path.display()))?;
    tracing::info!(
        accounts = graph.account_count(),
        transfers = graph.transfer_count(),
        "Loaded fixture"
    );
    Ok(graph)
}

pub fn build_analytics(store: Arc<dyn GraphStore>, ml: &MlArgs, config: AnalyticsConfig) -> Analytics {
    let clusterer = HttpClusterer::new(&ml.ml_url, config.clustering_timeout());
    Analytics::new(store, Arc::new(clusterer), config)
}

/// Analytics over a fixture when given, otherwise over Neo4j. The client is
/// returned for the Neo4j case.
pub async fn open_analytics(
    fixture: Option<&Path>,
    graph: &GraphArgs,
    ml: &MlArgs,
    config: AnalyticsConfig,
) -> Result<(Analytics, Option<GraphClient>)> {
    match fixture {
        Some(path) => {
            let store = load_fixture(path)?;
            Ok((build_analytics(Arc::new(store), ml, config), None))
        }
        None => {
            let client = graph.connect().await?;
            let store = Neo4jStore::new(client.clone());
            Ok((build_analytics(Arc::new(store), ml, config), Some(client)))
        }
    }
}
