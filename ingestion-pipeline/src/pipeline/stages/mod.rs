use common::{
    error::AppError,
    storage::{indexes::rebuild_indexes, types::turn::Turn},
};
use state_machines::core::GuardError;
use tracing::{debug, instrument, warn};

use super::{
    config::IngestionTuning,
    context::{PipelineContext, TurnOutcome},
    enrichment_result::LLMEnrichmentResult,
    services::{episode_text_for_turn, PipelineServices},
    state::{Enriched, GraphIngestionMachine, Persisted, Ready, Sampled},
};
use crate::errors::{categorize, ErrorCategory};
use common::storage::types::graph_node::GraphNode;

#[instrument(level = "trace", skip_all, fields(batch_id = %ctx.batch_id))]
pub async fn sample_existing(
    machine: GraphIngestionMachine<(), Ready>,
    ctx: &mut PipelineContext<'_>,
) -> Result<GraphIngestionMachine<(), Sampled>, AppError> {
    let group_id = ctx.batch.channels.first().cloned().unwrap_or_default();
    let limit = ctx.pipeline_config.tuning.existing_entity_sample;
    let existing = ctx
        .services
        .sample_existing_entities(&group_id, limit)
        .await?;

    debug!(
        batch_id = %ctx.batch_id,
        sampled_count = existing.len(),
        "sampled existing graph entities"
    );
    ctx.existing_entities = existing;

    machine
        .sample()
        .map_err(|(_, guard)| map_guard_error("sample", &guard))
}

/// Runs extraction and graph persistence per turn, sequentially, so a
/// transient failure partway through a batch still leaves earlier turns
/// marked ingested (`spec.md` §4.5/§7).
#[instrument(level = "trace", skip_all, fields(batch_id = %ctx.batch_id))]
pub async fn enrich(
    machine: GraphIngestionMachine<(), Sampled>,
    ctx: &mut PipelineContext<'_>,
) -> Result<GraphIngestionMachine<(), Enriched>, AppError> {
    let group_id = ctx.batch.channels.first().cloned().unwrap_or_default();
    let concurrency = ctx.pipeline_config.tuning.entity_embedding_concurrency;

    for turn in ctx.turns {
        let episode = episode_text_for_turn(turn);

        let attempt = ingest_one_turn(
            ctx.services,
            &ctx.pipeline_config.tuning,
            &group_id,
            &episode,
            &ctx.existing_entities,
            concurrency,
        )
        .await;

        match attempt {
            Ok(()) => {
                ctx.outcomes.push(TurnOutcome {
                    turn_id: turn.id.clone(),
                    ingested: true,
                });
            }
            Err(err) => {
                let category = categorize(&err);
                if category == ErrorCategory::InvalidInput {
                    warn!(
                        batch_id = %ctx.batch_id,
                        turn_id = %turn.id,
                        error = %err,
                        "dropped invalid turn during graph extraction"
                    );
                    ctx.outcomes.push(TurnOutcome {
                        turn_id: turn.id.clone(),
                        ingested: false,
                    });
                    continue;
                }

                warn!(
                    batch_id = %ctx.batch_id,
                    turn_id = %turn.id,
                    category = category.as_str(),
                    error = %err,
                    "halting graph ingestion batch after failure"
                );
                ctx.halted_category = Some(category);
                break;
            }
        }
    }

    machine
        .enrich()
        .map_err(|(_, guard)| map_guard_error("enrich", &guard))
}

/// The scheduler marks every turn in the batch with `graphiti_batch_id`
/// before the pipeline ever runs (`GraphIngestionBatch::claim_turns_and_create_pending`),
/// so this stage's job is the reverse: revert the marker on every turn that
/// did not actually make it into the graph (dropped as invalid, or never
/// attempted because the run halted), and decide the batch's terminal
/// status. A halt always fails the batch even if earlier turns succeeded —
/// `spec.md` §8's crashing-ingestion scenario expects `status=failed` with
/// the successful turns still marked.
#[instrument(level = "trace", skip_all, fields(batch_id = %ctx.batch_id))]
pub async fn persist(
    machine: GraphIngestionMachine<(), Enriched>,
    ctx: &mut PipelineContext<'_>,
) -> Result<GraphIngestionMachine<(), Persisted>, AppError> {
    let ingested_ids: std::collections::HashSet<&str> = ctx
        .outcomes
        .iter()
        .filter(|o| o.ingested)
        .map(|o| o.turn_id.as_str())
        .collect();

    let revert_ids: Vec<String> = ctx
        .turns
        .iter()
        .map(|turn| turn.id.clone())
        .filter(|id| !ingested_ids.contains(id.as_str()))
        .collect();

    if !revert_ids.is_empty() {
        Turn::reset_graph_markers(&revert_ids, ctx.db).await?;
    }

    if let Some(category) = ctx.halted_category {
        ctx.batch
            .mark_failed(category.as_str(), category.advice(), ctx.db)
            .await?;
    } else {
        let partial = ingested_ids.len() < ctx.turns.len();
        ctx.batch.mark_succeeded(partial, ctx.db).await?;
        rebuild_indexes(ctx.db).await?;
    }

    debug!(
        batch_id = %ctx.batch_id,
        ingested = ingested_ids.len(),
        reverted = revert_ids.len(),
        total = ctx.turns.len(),
        halted_category = ctx.halted_category.map(ErrorCategory::as_str),
        "graph ingestion batch finalized"
    );

    machine
        .persist()
        .map_err(|(_, guard)| map_guard_error("persist", &guard))
}

async fn ingest_one_turn(
    services: &dyn PipelineServices,
    tuning: &IngestionTuning,
    group_id: &str,
    episode_text: &str,
    existing_entities: &[GraphNode],
    entity_concurrency: usize,
) -> Result<(), AppError> {
    let extraction: LLMEnrichmentResult = services
        .run_extraction(episode_text, existing_entities)
        .await?;

    if extraction.entities.is_empty() && extraction.edges.is_empty() {
        return Ok(());
    }

    let (_, edges) = services
        .convert_extraction(group_id, extraction, entity_concurrency)
        .await?;

    services.store_edges(&edges, tuning).await
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid graph ingestion pipeline transition during {event}: {guard:?}"
    ))
}
