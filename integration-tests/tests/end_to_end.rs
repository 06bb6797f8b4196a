use std::sync::Arc;

use common::storage::types::{
    graph_batch::{GraphIngestionBatch, GraphIngestionStatus},
    graph_edge::GraphEdge,
    graph_node::GraphNode,
    summary::{Summary, SummaryType},
    turn::Turn,
};
use composite_retrieval::ambient_recall;
use ingestion_pipeline::{curator, curator::Mode, pipeline::IngestionPipeline};

mod test_utils;
use test_utils::{setup_test_database, FailingOnNthTurnServices};

const GROUP_ID: &str = "test-entity";

fn openai_client() -> async_openai::Client<async_openai::config::OpenAIConfig> {
    async_openai::Client::new()
}

/// Scenario 1: an empty system reports zero backlog and an ambient-recall
/// block with no more than a clock and a memory-health line.
#[tokio::test]
async fn empty_system_reports_zero_backlog() {
    let db = setup_test_database().await;

    assert_eq!(Turn::count_unsummarized(&db).await.unwrap(), 0);
    assert_eq!(Turn::count_ungraphed(&db).await.unwrap(), 0);

    let response = ambient_recall(&db, &openai_client(), GROUP_ID, "hello", None, None, 16_384)
        .await
        .expect("ambient_recall");

    assert!(response.formatted_context.contains("Clock:"));
    assert!(response.formatted_context.contains("Memory health:"));
    assert_eq!(response.memory_health.unsummarized, 0);
    assert_eq!(response.memory_health.uningested, 0);
}

/// Scenario 2: storing one turn, summarizing it, and storing the summary
/// drains the unsummarized backlog and records a one-turn summary.
#[tokio::test]
async fn first_turn_ingestion_drains_backlog_through_summary() {
    let db = setup_test_database().await;

    let turn = Turn::create_and_store(
        "terminal".into(),
        "Jeff".into(),
        false,
        "Hello".into(),
        None,
        None,
        &db,
    )
    .await
    .expect("store_message");

    assert_eq!(Turn::count_unsummarized(&db).await.unwrap(), 1);

    let unsummarized = Turn::get_unsummarized(&db, 50).await.expect("backlog");
    assert_eq!(unsummarized.len(), 1);
    assert_eq!(unsummarized[0].id, turn.id);

    let turn_ids = vec![turn.id.clone()];
    Summary::create_and_store(
        "short greeting from Jeff".into(),
        &turn_ids,
        turn.id.clone(),
        turn.id.clone(),
        vec!["terminal".into()],
        SummaryType::Social,
        &db,
    )
    .await
    .expect("store_summary");

    assert_eq!(Turn::count_unsummarized(&db).await.unwrap(), 0);
    let recent = Summary::get_recent(&db, 1).await.expect("recent summary");
    assert_eq!(recent[0].message_count, 1);
}

/// Scenario 3: a graph-ingestion batch of 10 turns whose 3rd extraction call
/// raises a rate-limit error ends with at least one turn ingested, the
/// remaining turns' markers reverted, and a `Failed`/`rate_limit` batch row.
#[tokio::test]
async fn crashing_ingestion_leaves_batch_failed_with_partial_progress() {
    let db = setup_test_database().await;

    for i in 0..10 {
        Turn::create_and_store(
            "general".into(),
            "alice".into(),
            false,
            format!("turn {i}"),
            None,
            None,
            &db,
        )
        .await
        .expect("store turn");
    }

    let (batch, turns) = GraphIngestionBatch::claim_turns_and_create_pending(&db, 10)
        .await
        .expect("claim")
        .expect("turns available");
    assert_eq!(turns.len(), 10);

    let services = Arc::new(FailingOnNthTurnServices::new(3));
    let pipeline = IngestionPipeline::with_services(
        Arc::clone(&db),
        ingestion_pipeline::pipeline::IngestionConfig::default(),
        services,
    );

    pipeline.run_batch(&batch, &turns).await.expect("run_batch");

    let ingested = Turn::count_marked_for_batch(&db, &batch.id).await.unwrap();
    assert!(ingested >= 1, "at least one turn should have succeeded before the halt");

    let remaining_uningested = Turn::count_ungraphed(&db).await.unwrap();
    assert_eq!(remaining_uningested, 10 - ingested);

    let failed = GraphIngestionBatch::recent_failed(&db, 10).await.expect("recent_failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status, GraphIngestionStatus::Failed);
    assert_eq!(failed[0].error_category.as_deref(), Some("rate_limit"));
}

/// Scenario 4: running the curator in auto-delete mode over a seeded
/// neighborhood collapses a duplicate `(Jeff, knows, Lyra)` pair down to one
/// edge and deletes the vague `?` entity node.
#[tokio::test]
async fn curator_auto_delete_removes_duplicate_edge_and_vague_node() {
    let db = setup_test_database().await;

    let embedding = vec![0.1, 0.2, 0.3];

    for _ in 0..2 {
        GraphEdge::new(
            GROUP_ID.into(),
            "Jeff".into(),
            "Lyra".into(),
            "knows".into(),
            "Jeff knows Lyra".into(),
            None,
            vec![],
            vec![],
            embedding.clone(),
        )
        .store(&db)
        .await
        .expect("store Jeff knows Lyra edge");
    }

    GraphEdge::new(
        GROUP_ID.into(),
        "Lyra".into(),
        "?".into(),
        "lives_at".into(),
        "Lyra lives at ?".into(),
        None,
        vec![],
        vec![],
        embedding,
    )
    .store(&db)
    .await
    .expect("store Lyra lives_at ? edge");

    let vague_node = GraphNode::find_or_create(GROUP_ID, "?", vec![], "", &db)
        .await
        .expect("seed vague node");

    curator::run(&db, GROUP_ID, &["Jeff".to_string(), "Lyra".to_string()], Mode::AutoDelete)
        .await
        .expect("curator run");

    let surviving = GraphEdge::facts_touching(&db, GROUP_ID, "Jeff", 10)
        .await
        .expect("facts touching Jeff");
    assert_eq!(surviving.len(), 1);
    assert_eq!(surviving[0].object_name, "Lyra");

    let remaining_node = GraphNode::search_by_name(&db, GROUP_ID, "?", 5)
        .await
        .expect("search for vague node");
    assert!(
        remaining_node.iter().all(|node| node.id != vague_node.id),
        "vague entity node should have been deleted"
    );
}

/// Scenario 5: with a 300-turn unsummarized backlog, startup-mode
/// ambient-recall reports the count rather than raw turn content.
#[tokio::test]
async fn startup_recall_reports_backlog_count_without_raw_content() {
    let db = setup_test_database().await;

    for i in 0..300 {
        Turn::create_and_store(
            "general".into(),
            "alice".into(),
            false,
            format!("secret turn content {i}"),
            None,
            None,
            &db,
        )
        .await
        .expect("store turn");
    }

    let response = ambient_recall(&db, &openai_client(), GROUP_ID, "startup", None, None, 16_384)
        .await
        .expect("ambient_recall startup");

    assert!(response.formatted_context.contains("Recent turns: 300"));
    assert!(!response.formatted_context.contains("secret turn content"));

    let summary_sections = response
        .results
        .iter()
        .filter(|item| item.layer == "summaries")
        .count();
    assert!(summary_sections <= 2);
}

/// Scenario 6: 8 parallel contextual ambient-recall calls each complete with
/// a non-empty formatted block.
#[tokio::test]
async fn concurrent_ambient_recall_calls_all_succeed() {
    let db = setup_test_database().await;

    GraphEdge::new(
        GROUP_ID.into(),
        "auth-service".into(),
        "jwt".into(),
        "uses".into(),
        "the auth service validates requests with a jwt".into(),
        None,
        vec![],
        vec![],
        vec![0.2, 0.4, 0.1],
    )
    .store(&db)
    .await
    .expect("store edge");

    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = Arc::clone(&db);
        handles.push(tokio::spawn(async move {
            ambient_recall(&db, &openai_client(), GROUP_ID, "debugging authentication", None, None, 16_384).await
        }));
    }

    for handle in handles {
        let response = handle.await.expect("task join").expect("ambient_recall");
        assert!(!response.formatted_context.is_empty());
    }
}
