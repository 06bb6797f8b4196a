use std::sync::{atomic::AtomicUsize, atomic::Ordering, Arc};

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{graph_edge::GraphEdge, graph_node::GraphNode},
    },
};
use ingestion_pipeline::pipeline::{LLMEnrichmentResult, PipelineServices};
use uuid::Uuid;

/// Sets up a fresh in-memory database for one test run.
pub async fn setup_test_database() -> Arc<SurrealDbClient> {
    let namespace = "integration_ns";
    let database = Uuid::new_v4().to_string();

    let db = SurrealDbClient::memory(namespace, &database)
        .await
        .expect("failed to start in-memory surrealdb");
    db.ensure_initialized().await.expect("failed to build indexes");

    Arc::new(db)
}

/// Stands in for the real LLM/graph-store round trip so the crashing-ingestion
/// scenario can deterministically fail on a chosen turn instead of depending
/// on an actual rate-limited provider.
pub struct FailingOnNthTurnServices {
    call_count: AtomicUsize,
    fail_on_call: usize,
}

impl FailingOnNthTurnServices {
    pub fn new(fail_on_call: usize) -> Self {
        Self {
            call_count: AtomicUsize::new(0),
            fail_on_call,
        }
    }
}

#[async_trait]
impl PipelineServices for FailingOnNthTurnServices {
    async fn sample_existing_entities(
        &self,
        _group_id: &str,
        _limit: usize,
    ) -> Result<Vec<GraphNode>, AppError> {
        Ok(Vec::new())
    }

    async fn run_extraction(
        &self,
        _episode_text: &str,
        _existing_entities: &[GraphNode],
    ) -> Result<LLMEnrichmentResult, AppError> {
        let call = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_call {
            return Err(AppError::Anyhow(anyhow::anyhow!(
                "429 Too Many Requests: rate limit exceeded"
            )));
        }
        Ok(LLMEnrichmentResult::default())
    }

    async fn convert_extraction(
        &self,
        _group_id: &str,
        _extraction: LLMEnrichmentResult,
        _entity_concurrency: usize,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), AppError> {
        Ok((Vec::new(), Vec::new()))
    }

    async fn store_edges(
        &self,
        _edges: &[GraphEdge],
        _tuning: &ingestion_pipeline::pipeline::IngestionTuning,
    ) -> Result<(), AppError> {
        Ok(())
    }
}
