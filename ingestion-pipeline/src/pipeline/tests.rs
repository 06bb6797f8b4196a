use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            graph_batch::GraphIngestionBatch,
            graph_edge::GraphEdge,
            graph_node::GraphNode,
            turn::Turn,
        },
    },
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    config::{IngestionConfig, IngestionTuning},
    enrichment_result::{LLMEnrichmentResult, LLMGraphEdge, LLMGraphEntity},
    services::PipelineServices,
    IngestionPipeline,
};

fn test_edge(group_id: &str) -> GraphEdge {
    GraphEdge::new(
        group_id.into(),
        "alice".into(),
        "rust".into(),
        "LIKES".into(),
        "alice likes rust".into(),
        None,
        vec!["Person".into()],
        vec!["Topic".into()],
        vec![0.1; 8],
    )
}

struct MockServices {
    existing: Vec<GraphNode>,
    extraction: LLMEnrichmentResult,
    edges: Vec<GraphEdge>,
    calls: Mutex<Vec<&'static str>>,
}

impl MockServices {
    fn new(group_id: &str) -> Self {
        Self {
            existing: vec![GraphNode::new(
                group_id.into(),
                "Existing Entity".into(),
                vec!["Topic".into()],
                String::new(),
            )],
            extraction: LLMEnrichmentResult {
                entities: vec![LLMGraphEntity {
                    key: "e1".into(),
                    name: "Existing Entity".into(),
                    labels: vec!["Topic".into()],
                    summary: String::new(),
                }],
                edges: vec![LLMGraphEdge {
                    subject_key: "e1".into(),
                    object_key: "e1".into(),
                    predicate: "LIKES".into(),
                    fact_text: "placeholder fact".into(),
                }],
            },
            edges: vec![test_edge(group_id)],
            calls: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self, stage: &'static str) {
        self.calls.lock().await.push(stage);
    }
}

#[async_trait]
impl PipelineServices for MockServices {
    async fn sample_existing_entities(
        &self,
        _group_id: &str,
        _limit: usize,
    ) -> Result<Vec<GraphNode>, AppError> {
        self.record("sample").await;
        Ok(self.existing.clone())
    }

    async fn run_extraction(
        &self,
        _episode_text: &str,
        _existing_entities: &[GraphNode],
    ) -> Result<LLMEnrichmentResult, AppError> {
        self.record("enrich").await;
        Ok(self.extraction.clone())
    }

    async fn convert_extraction(
        &self,
        _group_id: &str,
        _extraction: LLMEnrichmentResult,
        _entity_concurrency: usize,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), AppError> {
        self.record("convert").await;
        Ok((self.existing.clone(), self.edges.clone()))
    }

    async fn store_edges(
        &self,
        _edges: &[GraphEdge],
        _tuning: &super::config::IngestionTuning,
    ) -> Result<(), AppError> {
        self.record("persist_edges").await;
        Ok(())
    }
}

struct FailingServices {
    inner: MockServices,
}

#[async_trait]
impl PipelineServices for FailingServices {
    async fn sample_existing_entities(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, AppError> {
        self.inner.sample_existing_entities(group_id, limit).await
    }

    async fn run_extraction(
        &self,
        _episode_text: &str,
        _existing_entities: &[GraphNode],
    ) -> Result<LLMEnrichmentResult, AppError> {
        Err(AppError::Processing(
            "429 Too Many Requests from upstream LLM".to_string(),
        ))
    }

    async fn convert_extraction(
        &self,
        group_id: &str,
        extraction: LLMEnrichmentResult,
        entity_concurrency: usize,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), AppError> {
        self.inner
            .convert_extraction(group_id, extraction, entity_concurrency)
            .await
    }

    async fn store_edges(
        &self,
        edges: &[GraphEdge],
        tuning: &super::config::IngestionTuning,
    ) -> Result<(), AppError> {
        self.inner.store_edges(edges, tuning).await
    }
}

/// Fails extraction on the third turn only, to exercise the "crashing
/// ingestion" scenario: earlier turns stay ingested, the rest are left
/// unmarked for a later scheduler tick.
struct FlakyServices {
    inner: MockServices,
    call_count: Mutex<usize>,
}

#[async_trait]
impl PipelineServices for FlakyServices {
    async fn sample_existing_entities(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, AppError> {
        self.inner.sample_existing_entities(group_id, limit).await
    }

    async fn run_extraction(
        &self,
        episode_text: &str,
        existing_entities: &[GraphNode],
    ) -> Result<LLMEnrichmentResult, AppError> {
        let mut count = self.call_count.lock().await;
        *count += 1;
        if *count == 3 {
            return Err(AppError::Processing(
                "rate_limit exceeded, 429 too many requests".to_string(),
            ));
        }
        self.inner
            .run_extraction(episode_text, existing_entities)
            .await
    }

    async fn convert_extraction(
        &self,
        group_id: &str,
        extraction: LLMEnrichmentResult,
        entity_concurrency: usize,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), AppError> {
        self.inner
            .convert_extraction(group_id, extraction, entity_concurrency)
            .await
    }

    async fn store_edges(
        &self,
        edges: &[GraphEdge],
        tuning: &super::config::IngestionTuning,
    ) -> Result<(), AppError> {
        self.inner.store_edges(edges, tuning).await
    }
}

async fn setup_db() -> SurrealDbClient {
    let namespace = "pipeline_test";
    let database = Uuid::new_v4().to_string();
    SurrealDbClient::memory(namespace, &database)
        .await
        .expect("failed to create in-memory surrealdb")
}

fn pipeline_config() -> IngestionConfig {
    IngestionConfig {
        tuning: IngestionTuning {
            entity_embedding_concurrency: 2,
            ..IngestionTuning::default()
        },
    }
}

async fn store_turns(db: &SurrealDbClient, channel: &str, count: usize) -> Vec<Turn> {
    let mut turns = Vec::with_capacity(count);
    for i in 0..count {
        let turn = Turn::create_and_store(
            channel.into(),
            "alice".into(),
            false,
            format!("turn number {i}"),
            None,
            None,
            db,
        )
        .await
        .expect("store turn");
        turns.push(turn);
    }
    turns
}

#[tokio::test]
async fn graph_ingestion_happy_path_marks_batch_succeeded() {
    let db = setup_db().await;
    let group_id = "general";
    let _turns = store_turns(&db, group_id, 3).await;
    let (_, turns) = GraphIngestionBatch::claim_turns_and_create_pending(&db, 3)
        .await
        .expect("claim turns")
        .expect("turns were available to claim");
    let batch = GraphIngestionBatch::claim_next_pending(&db)
        .await
        .expect("claim")
        .expect("a batch was pending");

    let services = Arc::new(MockServices::new(group_id));
    let pipeline = IngestionPipeline::with_services(Arc::new(db.clone()), pipeline_config(), services.clone());

    pipeline
        .run_batch(&batch, &turns)
        .await
        .expect("pipeline runs");

    let stored_edges: Vec<GraphEdge> = db
        .get_all_stored_items::<GraphEdge>()
        .await
        .expect("edges stored");
    assert!(!stored_edges.is_empty(), "edges should be stored");

    let call_log = services.calls.lock().await.clone();
    assert_eq!(call_log[0], "sample");
    assert!(call_log[1..].iter().all(|entry| *entry == "enrich"
        || *entry == "convert"
        || *entry == "persist_edges"));
}

#[tokio::test]
async fn crashing_ingestion_fails_batch_but_keeps_earlier_turns_marked() {
    let db = setup_db().await;
    let group_id = "general";
    let _turns = store_turns(&db, group_id, 5).await;
    let (_, turns) = GraphIngestionBatch::claim_turns_and_create_pending(&db, 5)
        .await
        .expect("claim turns")
        .expect("turns were available to claim");
    let batch = GraphIngestionBatch::claim_next_pending(&db)
        .await
        .expect("claim")
        .expect("a batch was pending");

    let services = Arc::new(FlakyServices {
        inner: MockServices::new(group_id),
        call_count: Mutex::new(0),
    });
    let pipeline = IngestionPipeline::with_services(Arc::new(db.clone()), pipeline_config(), services);

    pipeline
        .run_batch(&batch, &turns)
        .await
        .expect("pipeline does not bubble categorized upstream errors");

    let stored_batch: GraphIngestionBatch = db
        .get_item(&batch.id)
        .await
        .expect("retrieve batch")
        .expect("batch present");
    assert_eq!(
        stored_batch.status,
        common::storage::types::graph_batch::GraphIngestionStatus::Failed,
        "a halted batch is failed even though earlier turns succeeded"
    );
    assert_eq!(stored_batch.error_category.as_deref(), Some("rate_limit"));

    for turn in &turns[..2] {
        let stored: Turn = db
            .get_item(&turn.id)
            .await
            .expect("retrieve turn")
            .expect("turn present");
        assert!(stored.graphiti_batch_id.is_some(), "earlier turns should stay marked ingested");
    }

    for turn in &turns[2..] {
        let stored: Turn = db
            .get_item(&turn.id)
            .await
            .expect("retrieve turn")
            .expect("turn present");
        assert!(
            stored.graphiti_batch_id.is_none(),
            "turns from the halt point onward should be reverted for retry"
        );
    }
}

#[tokio::test]
async fn all_turns_failing_marks_batch_failed() {
    let db = setup_db().await;
    let group_id = "general";
    let _turns = store_turns(&db, group_id, 2).await;
    let (_, turns) = GraphIngestionBatch::claim_turns_and_create_pending(&db, 2)
        .await
        .expect("claim turns")
        .expect("turns were available to claim");
    let batch = GraphIngestionBatch::claim_next_pending(&db)
        .await
        .expect("claim")
        .expect("a batch was pending");

    let services = Arc::new(FailingServices {
        inner: MockServices::new(group_id),
    });
    let pipeline = IngestionPipeline::with_services(Arc::new(db.clone()), pipeline_config(), services);

    pipeline
        .run_batch(&batch, &turns)
        .await
        .expect("pipeline does not bubble categorized upstream errors");

    let stored_batch: GraphIngestionBatch = db
        .get_item(&batch.id)
        .await
        .expect("retrieve batch")
        .expect("batch present");
    assert_eq!(
        stored_batch.status,
        common::storage::types::graph_batch::GraphIngestionStatus::Failed
    );
    assert_eq!(stored_batch.error_category.as_deref(), Some("rate_limit"));

    for turn in &turns {
        let stored: Turn = db
            .get_item(&turn.id)
            .await
            .expect("retrieve turn")
            .expect("turn present");
        assert!(stored.graphiti_batch_id.is_none());
    }
}
