//! Operator entry point for running graph-ingestion batches by hand, paced
//! between batches rather than driven by the scheduler's backlog threshold
//! (`spec.md` §4.5). Useful for draining a large backlog without competing
//! with the worker process, or for a dry run against a sandbox entity.

use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use clap::Parser;
use common::{
    storage::{db::SurrealDbClient, types::graph_batch::GraphIngestionBatch},
    utils::config::get_config,
};
use ingestion_pipeline::pipeline::IngestionPipeline;
use tokio::time::{sleep, Duration};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run graph-ingestion batches on a manual pace")]
struct Args {
    /// Turns claimed per batch.
    #[arg(long, default_value_t = 10)]
    batch_size: usize,

    /// Seconds to sleep between batches.
    #[arg(long, default_value_t = 5)]
    pause: u64,

    /// Stop after this many batches even if the backlog isn't empty (0 = unbounded).
    #[arg(long, default_value_t = 0)]
    max_batches: usize,

    /// Point at a different namespace/database instead of the configured one,
    /// so a paced run can be rehearsed without touching live data.
    #[arg(long)]
    sandbox: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let mut config = get_config()?;
    if let Some(sandbox_database) = &args.sandbox {
        info!(database = %sandbox_database, "running against a sandbox database");
        config.surrealdb_database = sandbox_database.clone();
    }

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

    let openai_client = Arc::new(Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let pipeline = IngestionPipeline::new(Arc::clone(&db), Arc::clone(&openai_client));

    let mut batches_run = 0usize;
    loop {
        if args.max_batches > 0 && batches_run >= args.max_batches {
            info!(batches_run, "reached --max-batches, stopping");
            break;
        }

        let Some((batch, turns)) =
            GraphIngestionBatch::claim_turns_and_create_pending(&db, args.batch_size).await?
        else {
            info!("no ungraphed turns left, stopping");
            break;
        };

        pipeline.run_batch(&batch, &turns).await?;
        batches_run += 1;
        info!(batch_id = %batch.id, turns = turns.len(), batches_run, "batch ingested");

        sleep(Duration::from_secs(args.pause)).await;
    }

    Ok(())
}
