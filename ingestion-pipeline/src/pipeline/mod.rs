mod config;
mod context;
mod enrichment_result;
mod services;
mod stages;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
pub use enrichment_result::{LLMEnrichmentResult, LLMGraphEdge, LLMGraphEntity};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_openai::Client;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{graph_batch::GraphIngestionBatch, turn::Turn},
    },
};
use tracing::info;

use self::{
    context::PipelineContext,
    stages::{enrich, persist, sample_existing},
    state::ready,
};
use crate::errors::categorize;

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
    ) -> Self {
        Self::new_with_config(db, openai_client, IngestionConfig::default())
    }

    pub fn new_with_config(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<Client<async_openai::config::OpenAIConfig>>,
        pipeline_config: IngestionConfig,
    ) -> Self {
        let services = DefaultPipelineServices::new(Arc::clone(&db), openai_client);
        Self::with_services(db, pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            db,
            pipeline_config,
            services,
        }
    }

    /// Runs the graph-ingestion pipeline for a batch already claimed
    /// (`GraphIngestionBatch::claim_next_pending`) and its turns, driving
    /// `sample -> enrich -> persist` to completion. Never returns an error for
    /// an upstream LLM/graph-store failure: those are categorized and folded
    /// into the batch's `Failed`/`SucceededPartial` row by the `persist`
    /// stage. An `Err` here means the pipeline itself could not run (a state
    /// machine or database-write fault), not that extraction failed.
    #[tracing::instrument(
        skip_all,
        fields(batch_id = %batch.id, turn_count = turns.len())
    )]
    pub async fn run_batch(
        &self,
        batch: &GraphIngestionBatch,
        turns: &[Turn],
    ) -> Result<(), AppError> {
        let mut ctx = PipelineContext::new(
            batch,
            turns,
            self.db.as_ref(),
            &self.pipeline_config,
            self.services.as_ref(),
        );

        let machine = ready();
        let pipeline_started = Instant::now();

        let stage_start = Instant::now();
        let machine = sample_existing(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let sample_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let machine = enrich(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let enrich_duration = stage_start.elapsed();

        let stage_start = Instant::now();
        let _machine = persist(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let persist_duration = stage_start.elapsed();

        let total_duration = pipeline_started.elapsed();
        info!(
            batch_id = %ctx.batch_id,
            total_ms = Self::duration_millis(total_duration),
            sample_ms = Self::duration_millis(sample_duration),
            enrich_ms = Self::duration_millis(enrich_duration),
            persist_ms = Self::duration_millis(persist_duration),
            halted_category = ctx.halted_category.map(|c| c.as_str()),
            ingested = ctx.outcomes.iter().filter(|o| o.ingested).count(),
            "graph ingestion pipeline finished"
        );

        Ok(())
    }

    /// Backoff between scheduler ticks after a batch halts on a transient
    /// upstream failure, keyed by how many consecutive ticks have halted.
    pub fn retry_delay(&self, consecutive_halts: u32) -> Duration {
        let tuning = &self.pipeline_config.tuning;
        let capped = consecutive_halts
            .saturating_sub(1)
            .min(tuning.retry_backoff_cap_exponent);
        let multiplier = 2_u64.pow(capped);
        let delay = tuning.retry_base_delay_secs.saturating_mul(multiplier);

        Duration::from_secs(delay.min(tuning.retry_max_delay_secs))
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// True if the given error should stop the scheduler from claiming further
/// batches this run (quota exhaustion, auth failure) rather than just
/// failing the current one.
pub fn halts_scheduler(err: &AppError) -> bool {
    categorize(err).halts_scheduler()
}

#[cfg(test)]
mod tests;
