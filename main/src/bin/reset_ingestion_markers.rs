//! Operator entry point for re-enqueuing turns stranded under a `Failed`
//! graph-ingestion batch. Clears their `graphiti_batch_id` marker so the
//! next scheduler tick claims them again (`spec.md` §4.5, §7).

use std::sync::Arc;

use clap::Parser;
use common::{
    storage::{
        db::SurrealDbClient,
        types::{graph_batch::GraphIngestionBatch, turn::Turn},
    },
    utils::config::get_config,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MAX_FAILED_BATCHES: usize = 100;

#[derive(Parser, Debug)]
#[command(author, version, about = "Re-enqueue turns stranded under a failed graph-ingestion batch")]
struct Args {
    /// Report what would be reset without writing anything.
    #[arg(long)]
    dry_run: bool,
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

    let failed_batches = GraphIngestionBatch::recent_failed(&db, MAX_FAILED_BATCHES).await?;
    let mut reset_total = 0usize;

    for batch in &failed_batches {
        let stranded = Turn::marked_for_batch(&db, &batch.id).await?;
        if stranded.is_empty() {
            continue;
        }

        info!(
            batch_id = %batch.id,
            turns = stranded.len(),
            error_category = batch.error_category.as_deref().unwrap_or("unknown"),
            dry_run = args.dry_run,
            "found turns stranded under a failed batch"
        );

        if !args.dry_run {
            let ids: Vec<String> = stranded.iter().map(|t| t.id.clone()).collect();
            Turn::reset_graph_markers(&ids, &db).await?;
        }
        reset_total += stranded.len();
    }

    if args.dry_run {
        info!(turns = reset_total, "dry run: would reset these turns' graph markers");
    } else {
        info!(turns = reset_total, "reset graph markers on stranded turns");
    }

    Ok(())
}
