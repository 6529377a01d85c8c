//! Schema bootstrap command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::GraphArgs;

#[derive(Args)]
pub struct SchemaArgs {
    /// Print the statements without running them
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub graph: GraphArgs,
}

pub async fn execute(args: SchemaArgs) -> Result<()> {
    if args.dry_run {
        for statement in fraudgraph_graph::schema::schema_statements() {
            println!("{};", statement);
        }
        return Ok(());
    }

    let client = args.graph.connect().await?;
    println!("{}", "Initializing graph schema...".bold());
    let applied = fraudgraph_graph::initialize_schema(&client).await?;
    println!("{} {} constraints and indexes ensured", "✓".green(), applied);
    Ok(())
}
