use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{graph_batch::GraphIngestionBatch, graph_node::GraphNode, turn::Turn},
    },
};
use tracing::error;

use super::{config::IngestionConfig, services::PipelineServices};
use crate::errors::ErrorCategory;

/// Outcome of ingesting a single turn's episode into the graph, tracked so
/// the batch can be marked `Succeeded`/`SucceededPartial`/`Failed` once every
/// turn has been attempted (or the run halted on a transient failure).
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn_id: String,
    pub ingested: bool,
}

pub struct PipelineContext<'a> {
    pub batch: &'a GraphIngestionBatch,
    pub batch_id: String,
    pub db: &'a SurrealDbClient,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
    pub turns: &'a [Turn],
    pub existing_entities: Vec<GraphNode>,
    pub outcomes: Vec<TurnOutcome>,
    pub halted_category: Option<ErrorCategory>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        batch: &'a GraphIngestionBatch,
        turns: &'a [Turn],
        db: &'a SurrealDbClient,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
    ) -> Self {
        let batch_id = batch.id.clone();
        Self {
            batch,
            batch_id,
            db,
            pipeline_config,
            services,
            turns,
            existing_entities: Vec::new(),
            outcomes: Vec::new(),
            halted_category: None,
        }
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            batch_id = %self.batch_id,
            error = %err,
            "graph ingestion pipeline aborted"
        );
        err
    }
}
