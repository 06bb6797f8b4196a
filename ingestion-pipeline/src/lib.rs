#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod curator;
pub mod documents;
pub mod errors;
pub mod pipeline;
pub mod scheduler;
pub mod summarize;
pub mod utils;

pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionTuning};

use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{error::AppError, storage::db::SurrealDbClient, utils::config::SchedulerConfig};

pub use scheduler::run_scheduler;

/// Entry point for the worker process: runs the summarization and
/// graph-ingestion scheduler until the process is killed.
pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    openai_client: Arc<Client<OpenAIConfig>>,
    ingestion_pipeline: Arc<IngestionPipeline>,
    scheduler_config: SchedulerConfig,
) -> Result<(), AppError> {
    run_scheduler(db, openai_client, ingestion_pipeline, scheduler_config).await
}
