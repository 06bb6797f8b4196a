//! Operator entry point for the graph curator (`spec.md` §4.6): samples the
//! neighborhood of recently-touched entities and reports vague names and
//! duplicate facts, optionally deleting the strictest subset.

use std::sync::Arc;

use clap::Parser;
use common::{storage::db::SurrealDbClient, utils::config::get_config};
use ingestion_pipeline::curator::{self, Mode};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default number of recently-touched entities the curator samples around
/// when `--deep` is not given.
const SHALLOW_SEED_COUNT: usize = 50;
/// Wider neighborhood sampled under `--deep`.
const DEEP_SEED_COUNT: usize = 500;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find and optionally remove vague entities and duplicate facts")]
struct Args {
    /// Sample a much wider neighborhood of recently-touched entities.
    #[arg(long)]
    deep: bool,

    /// Delete the strictest subset of findings instead of only reporting them.
    #[arg(long)]
    auto_delete: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    let seed_count = if args.deep { DEEP_SEED_COUNT } else { SHALLOW_SEED_COUNT };
    let seeds = common::storage::types::graph_node::GraphNode::recent(&db, &config.entity_name, seed_count)
        .await?
        .into_iter()
        .map(|node| node.name)
        .collect::<Vec<_>>();

    let mode = if args.auto_delete { Mode::AutoDelete } else { Mode::ReportOnly };
    let report = curator::run(&db, &config.entity_name, &seeds, mode).await?;

    info!(
        vague_entities = report.vague_entities.len(),
        duplicate_edges = report.duplicate_edges.len(),
        mode = ?mode,
        "curator run complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
