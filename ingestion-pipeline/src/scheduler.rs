//! Combined summarization and graph-ingestion scheduler loop (`spec.md`
//! §4.5). Runs forever from the worker process: each tick drains the
//! unsummarized backlog, then claims and runs as many graph-ingestion
//! batches as `graph_concurrency` allows, backing off after a batch halts
//! on a transient upstream failure.

use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            graph_batch::{GraphIngestionBatch, GraphIngestionStatus},
            turn::Turn,
        },
    },
    utils::config::SchedulerConfig,
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::{pipeline::IngestionPipeline, summarize::summarize_tick};

/// Drives the scheduler until the process is killed. `Err` only propagates
/// for a database fault the scheduler cannot recover from; upstream
/// LLM/graph-store failures are handled internally via backoff.
pub async fn run_scheduler(
    db: Arc<SurrealDbClient>,
    openai_client: Arc<Client<OpenAIConfig>>,
    pipeline: Arc<IngestionPipeline>,
    config: SchedulerConfig,
) -> Result<(), AppError> {
    let mut consecutive_halts: u32 = 0;

    loop {
        match summarize_tick(&db, &openai_client, &config).await {
            Ok(count) if count > 0 => {
                info!(turns = count, "summarization tick drained backlog");
            }
            Ok(_) => {}
            Err(err) => error!(error = %err, "summarization tick failed"),
        }

        let backlog = Turn::count_ungraphed(&db).await?;
        if backlog < config.graph_threshold {
            sleep(Duration::from_secs(config.inter_batch_sleep_secs)).await;
            continue;
        }

        let halted = run_graph_ticks(&db, &pipeline, &config).await?;
        if halted {
            consecutive_halts += 1;
            let delay = pipeline.retry_delay(consecutive_halts);
            warn!(
                consecutive_halts,
                delay_secs = delay.as_secs(),
                "graph ingestion batch halted, backing off before the next tick"
            );
            sleep(delay).await;
        } else {
            consecutive_halts = 0;
            sleep(Duration::from_secs(config.inter_batch_sleep_secs)).await;
        }
    }
}

/// Claims up to `graph_concurrency` batches and runs them concurrently.
/// Returns true if any batch in the round ended up `Failed`, so the caller
/// can back off before claiming the next round.
async fn run_graph_ticks(
    db: &SurrealDbClient,
    pipeline: &IngestionPipeline,
    config: &SchedulerConfig,
) -> Result<bool, AppError> {
    let mut claims = Vec::new();
    for _ in 0..config.graph_concurrency.max(1) {
        match GraphIngestionBatch::claim_turns_and_create_pending(db, config.graph_batch).await? {
            Some((batch, turns)) => {
                let Some(in_flight) = GraphIngestionBatch::claim_next_pending(db).await? else {
                    break;
                };
                debug_assert_eq!(in_flight.id, batch.id);
                claims.push((in_flight, turns));
            }
            None => break,
        }
    }

    if claims.is_empty() {
        return Ok(false);
    }

    let mut in_flight: FuturesUnordered<_> = claims
        .into_iter()
        .map(|(batch, turns)| async move {
            let batch_id = batch.id.clone();
            let run_result = pipeline.run_batch(&batch, &turns).await;
            (batch_id, run_result)
        })
        .collect();

    let mut halted = false;
    while let Some((batch_id, run_result)) = in_flight.next().await {
        if let Err(err) = run_result {
            error!(batch_id = %batch_id, error = %err, "graph ingestion pipeline run errored");
            halted = true;
            continue;
        }

        let refreshed: Option<GraphIngestionBatch> = db.get_item(&batch_id).await?;
        if matches!(refreshed.map(|b| b.status), Some(GraphIngestionStatus::Failed)) {
            halted = true;
        }
    }

    Ok(halted)
}
