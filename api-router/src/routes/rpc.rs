//! The RPC/tool surface (`spec.md` §4.8): one POST handler per endpoint,
//! each checking the shared-secret token first, then logging a trace event
//! synchronously before returning. No handler ever leaks a raw `AppError`
//! string back to the caller; `ApiError`'s `From<AppError>` takes care of
//! that.

use std::time::Instant;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use common::storage::types::{
    graph_batch::{GraphIngestionBatch, GraphIngestionStats},
    summary::{Summary, SummaryType},
    trace_event::TraceEvent,
    turn::Turn,
    vector_document::VectorDocument,
};
use composite_retrieval::ambient_recall as run_ambient_recall;
use retrieval_pipeline::{documents, graph};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{api_state::ApiState, auth, error::ApiError};

const FRICTION_COLLECTION: &str = "friction";

fn severity_rank(severity: &str) -> u8 {
    match severity.to_lowercase().as_str() {
        "low" => 0,
        "medium" => 1,
        "high" => 2,
        "critical" => 3,
        _ => 0,
    }
}

async fn log_trace(state: &ApiState, session_id: &str, event_type: &str, event_data: serde_json::Value, started: Instant) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if let Err(err) = TraceEvent::record(session_id, "rpc", event_type, event_data, Some(duration_ms), &state.db).await {
        tracing::warn!(%err, event_type, "failed to record trace event");
    }
}

fn session_id_of(session_id: &Option<String>) -> &str {
    session_id.as_deref().unwrap_or("unscoped")
}

// ---------------------------------------------------------------------
// ambient_recall
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AmbientRecallRequest {
    pub token: String,
    pub context: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub limit_per_layer: Option<usize>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AmbientRecallApiResponse {
    pub success: bool,
    pub formatted_context: String,
    pub results: Vec<composite_retrieval::RenderedItem>,
    pub clock: String,
    pub memory_health: composite_retrieval::MemoryHealth,
}

pub async fn ambient_recall(
    State(state): State<ApiState>,
    Json(req): Json<AmbientRecallRequest>,
) -> Result<Json<AmbientRecallApiResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = run_ambient_recall(
        &state.db,
        &state.openai_client,
        &state.config.entity_name,
        &req.context,
        req.channel.as_deref(),
        req.limit_per_layer,
        state.config.recall_byte_cap,
    )
    .await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "ambient_recall",
        json!({"context": req.context, "channel": req.channel}),
        started,
    )
    .await;

    let response = result?;
    Ok(Json(AmbientRecallApiResponse {
        success: true,
        formatted_context: response.formatted_context,
        results: response.results,
        clock: response.clock,
        memory_health: response.memory_health,
    }))
}

// ---------------------------------------------------------------------
// store_message
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct StoreMessageRequest {
    pub token: String,
    pub content: String,
    pub author_name: String,
    pub channel: String,
    pub is_own_utterance: bool,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoreMessageResponse {
    pub success: bool,
    pub turn: Turn,
    pub deduped: bool,
}

pub async fn store_message(
    State(state): State<ApiState>,
    Json(req): Json<StoreMessageRequest>,
) -> Result<Json<StoreMessageResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = store_message_inner(&state, &req).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "store_message",
        json!({"channel": req.channel, "content_len": req.content.len()}),
        started,
    )
    .await;

    let (turn, deduped) = result?;
    Ok(Json(StoreMessageResponse {
        success: true,
        turn,
        deduped,
    }))
}

async fn store_message_inner(state: &ApiState, req: &StoreMessageRequest) -> Result<(Turn, bool), ApiError> {
    if let Some(external_id) = &req.external_id {
        if let Some(existing) =
            Turn::find_by_session_and_external_id(&state.db, req.session_id.as_deref(), external_id).await?
        {
            return Ok((existing, true));
        }
    }

    let turn = Turn::create_and_store(
        req.channel.clone(),
        req.author_name.clone(),
        req.is_own_utterance,
        req.content.clone(),
        req.external_id.clone(),
        req.session_id.clone(),
        &state.db,
    )
    .await?;
    Ok((turn, false))
}

// ---------------------------------------------------------------------
// summarize_messages
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SummarizeMessagesRequest {
    pub token: String,
    pub limit: usize,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummarizeMessagesResponse {
    pub success: bool,
    pub summary: Option<Summary>,
}

pub async fn summarize_messages(
    State(state): State<ApiState>,
    Json(req): Json<SummarizeMessagesRequest>,
) -> Result<Json<SummarizeMessagesResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = ingestion_pipeline::summarize::summarize_now(&state.db, &state.openai_client, req.limit).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "summarize_messages",
        json!({"limit": req.limit}),
        started,
    )
    .await;

    Ok(Json(SummarizeMessagesResponse {
        success: true,
        summary: result?,
    }))
}

// ---------------------------------------------------------------------
// store_summary
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StoreSummaryRequest {
    pub token: String,
    pub summary_text: String,
    pub start_id: String,
    pub end_id: String,
    pub channels: Vec<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StoreSummaryResponse {
    pub success: bool,
    pub summary: Summary,
}

pub async fn store_summary(
    State(state): State<ApiState>,
    Json(req): Json<StoreSummaryRequest>,
) -> Result<Json<StoreSummaryResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = store_summary_inner(&state, &req).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "store_summary",
        json!({"start_id": req.start_id, "end_id": req.end_id}),
        started,
    )
    .await;

    Ok(Json(StoreSummaryResponse {
        success: true,
        summary: result?,
    }))
}

async fn store_summary_inner(state: &ApiState, req: &StoreSummaryRequest) -> Result<Summary, ApiError> {
    let turns = Turn::get_range(&state.db, &req.start_id, &req.end_id).await?;
    let turn_ids: Vec<String> = turns.iter().map(|turn| turn.id.clone()).collect();

    let summary = Summary::create_and_store(
        req.summary_text.clone(),
        &turn_ids,
        req.start_id.clone(),
        req.end_id.clone(),
        req.channels.clone(),
        SummaryType::Mixed,
        &state.db,
    )
    .await?;
    Ok(summary)
}

// ---------------------------------------------------------------------
// get_crystals
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GetCrystalsRequest {
    pub token: String,
    pub count: usize,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetCrystalsResponse {
    pub success: bool,
    pub crystals: Vec<VectorDocument>,
}

pub async fn get_crystals(
    State(state): State<ApiState>,
    Json(req): Json<GetCrystalsRequest>,
) -> Result<Json<GetCrystalsResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = documents::recent_crystals(&state.db, req.count).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "get_crystals",
        json!({"count": req.count}),
        started,
    )
    .await;

    Ok(Json(GetCrystalsResponse {
        success: true,
        crystals: result?,
    }))
}

// ---------------------------------------------------------------------
// get_turns_since
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GetTurnsSinceRequest {
    pub token: String,
    pub timestamp: DateTime<Utc>,
    pub limit: usize,
    #[serde(default)]
    pub include_summaries: bool,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetTurnsSinceResponse {
    pub success: bool,
    pub turns: Vec<Turn>,
    pub summaries: Option<Vec<Summary>>,
}

pub async fn get_turns_since(
    State(state): State<ApiState>,
    Json(req): Json<GetTurnsSinceRequest>,
) -> Result<Json<GetTurnsSinceResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = get_turns_since_inner(&state, &req).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "get_turns_since",
        json!({"timestamp": req.timestamp, "include_summaries": req.include_summaries}),
        started,
    )
    .await;

    let (turns, summaries) = result?;
    Ok(Json(GetTurnsSinceResponse {
        success: true,
        turns,
        summaries,
    }))
}

async fn get_turns_since_inner(
    state: &ApiState,
    req: &GetTurnsSinceRequest,
) -> Result<(Vec<Turn>, Option<Vec<Summary>>), ApiError> {
    let turns = Turn::get_since(&state.db, req.timestamp, req.channel.as_deref(), req.limit).await?;
    let summaries = if req.include_summaries {
        Some(Summary::get_since(&state.db, req.timestamp, req.limit).await?)
    } else {
        None
    };
    Ok((turns, summaries))
}

// ---------------------------------------------------------------------
// get_turns_since_summary
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GetTurnsSinceSummaryRequest {
    pub token: String,
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub min_turns: usize,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GetTurnsSinceSummaryResponse {
    pub success: bool,
    pub turns: Vec<Turn>,
}

pub async fn get_turns_since_summary(
    State(state): State<ApiState>,
    Json(req): Json<GetTurnsSinceSummaryRequest>,
) -> Result<Json<GetTurnsSinceSummaryResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = get_turns_since_summary_inner(&state, &req).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "get_turns_since_summary",
        json!({"limit": req.limit, "offset": req.offset, "min_turns": req.min_turns}),
        started,
    )
    .await;

    Ok(Json(GetTurnsSinceSummaryResponse {
        success: true,
        turns: result?,
    }))
}

async fn get_turns_since_summary_inner(
    state: &ApiState,
    req: &GetTurnsSinceSummaryRequest,
) -> Result<Vec<Turn>, ApiError> {
    let backlog = Turn::get_unsummarized(&state.db, req.offset + req.limit).await?;
    if backlog.len() < req.min_turns {
        return Ok(Vec::new());
    }
    Ok(backlog.into_iter().skip(req.offset).take(req.limit).collect())
}

// ---------------------------------------------------------------------
// graphiti_ingestion_stats
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct GraphitiIngestionStatsRequest {
    pub token: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GraphitiIngestionStatsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub stats: GraphIngestionStats,
}

pub async fn graphiti_ingestion_stats(
    State(state): State<ApiState>,
    Json(req): Json<GraphitiIngestionStatsRequest>,
) -> Result<Json<GraphitiIngestionStatsResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = GraphIngestionBatch::stats(&state.db).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "graphiti_ingestion_stats",
        json!({}),
        started,
    )
    .await;

    Ok(Json(GraphitiIngestionStatsResponse {
        success: true,
        stats: result?,
    }))
}

// ---------------------------------------------------------------------
// ingest_batch_to_graphiti
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct IngestBatchToGraphitiRequest {
    pub token: String,
    pub batch_size: usize,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestBatchToGraphitiResponse {
    pub success: bool,
    pub ingested: usize,
    pub failed: usize,
    pub remaining: usize,
}

pub async fn ingest_batch_to_graphiti(
    State(state): State<ApiState>,
    Json(req): Json<IngestBatchToGraphitiRequest>,
) -> Result<Json<IngestBatchToGraphitiResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = ingest_batch_to_graphiti_inner(&state, req.batch_size).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "ingest_batch_to_graphiti",
        json!({"batch_size": req.batch_size}),
        started,
    )
    .await;

    let (ingested, failed, remaining) = result?;
    Ok(Json(IngestBatchToGraphitiResponse {
        success: true,
        ingested,
        failed,
        remaining,
    }))
}

async fn ingest_batch_to_graphiti_inner(state: &ApiState, batch_size: usize) -> Result<(usize, usize, usize), ApiError> {
    let Some((batch, turns)) = GraphIngestionBatch::claim_turns_and_create_pending(&state.db, batch_size).await?
    else {
        let remaining = Turn::count_ungraphed(&state.db).await?;
        return Ok((0, 0, remaining));
    };

    let turn_count = turns.len();
    state.ingestion_pipeline.run_batch(&batch, &turns).await?;

    let ingested = Turn::count_marked_for_batch(&state.db, &batch.id).await?;
    let failed = turn_count.saturating_sub(ingested);
    let remaining = Turn::count_ungraphed(&state.db).await?;

    Ok((ingested, failed, remaining))
}

// ---------------------------------------------------------------------
// delete_edge
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DeleteEdgeRequest {
    pub token: String,
    pub uuid: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteEdgeResponse {
    pub success: bool,
}

pub async fn delete_edge(
    State(state): State<ApiState>,
    Json(req): Json<DeleteEdgeRequest>,
) -> Result<Json<DeleteEdgeResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = graph::delete_edge(&state.db, &req.uuid).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "delete_edge",
        json!({"uuid": req.uuid}),
        started,
    )
    .await;

    result?;
    Ok(Json(DeleteEdgeResponse { success: true }))
}

// ---------------------------------------------------------------------
// texture_search
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct TextureSearchRequest {
    pub token: String,
    pub query: String,
    pub limit: usize,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TextureSearchResponse {
    pub success: bool,
    pub items: Vec<graph::GraphSearchItem>,
}

pub async fn texture_search(
    State(state): State<ApiState>,
    Json(req): Json<TextureSearchRequest>,
) -> Result<Json<TextureSearchResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = graph::search(
        &state.db,
        &state.openai_client,
        &state.config.entity_name,
        &req.query,
        None,
        req.limit,
        req.limit,
        1,
    )
    .await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "texture_search",
        json!({"query": req.query, "limit": req.limit}),
        started,
    )
    .await;

    Ok(Json(TextureSearchResponse {
        success: true,
        items: result?,
    }))
}

// ---------------------------------------------------------------------
// agent_context
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AgentContextRequest {
    pub token: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AgentContextResponse {
    pub success: bool,
    pub formatted_context: String,
    pub clock: String,
}

/// A condensed render of ambient-recall's startup mode, for an adapter that
/// wants a quick identity/continuity snapshot without the full result set.
pub async fn agent_context(
    State(state): State<ApiState>,
    Json(req): Json<AgentContextRequest>,
) -> Result<Json<AgentContextResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = run_ambient_recall(
        &state.db,
        &state.openai_client,
        &state.config.entity_name,
        "startup",
        None,
        None,
        state.config.recall_byte_cap,
    )
    .await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "agent_context",
        json!({}),
        started,
    )
    .await;

    let response = result?;
    Ok(Json(AgentContextResponse {
        success: true,
        formatted_context: response.formatted_context,
        clock: response.clock,
    }))
}

// ---------------------------------------------------------------------
// friction_search
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct FrictionSearchRequest {
    pub token: String,
    pub query: String,
    pub limit: usize,
    #[serde(default)]
    pub min_severity: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FrictionSearchResponse {
    pub success: bool,
    pub items: Vec<VectorDocument>,
}

pub async fn friction_search(
    State(state): State<ApiState>,
    Json(req): Json<FrictionSearchRequest>,
) -> Result<Json<FrictionSearchResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = friction_search_inner(&state, &req).await;

    log_trace(
        &state,
        session_id_of(&req.session_id),
        "friction_search",
        json!({"query": req.query, "min_severity": req.min_severity}),
        started,
    )
    .await;

    Ok(Json(FrictionSearchResponse {
        success: true,
        items: result?,
    }))
}

async fn friction_search_inner(state: &ApiState, req: &FrictionSearchRequest) -> Result<Vec<VectorDocument>, ApiError> {
    let ranked = documents::search(&state.db, &state.openai_client, FRICTION_COLLECTION, &req.query, req.limit).await?;
    let min_rank = req.min_severity.as_deref().map(severity_rank).unwrap_or(0);

    Ok(ranked
        .into_iter()
        .map(|r| r.document)
        .filter(|doc| {
            doc.metadata
                .doc_type
                .as_deref()
                .map(severity_rank)
                .unwrap_or(0)
                >= min_rank
        })
        .collect())
}

// ---------------------------------------------------------------------
// pps_health
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PpsHealthRequest {
    pub token: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PpsHealthResponse {
    pub success: bool,
    pub db_ok: bool,
    pub unsummarized: usize,
    pub uningested: usize,
    pub graph_stats: GraphIngestionStats,
    pub crystals: usize,
    pub word_photos: usize,
    pub tech_rag_docs: usize,
}

pub async fn pps_health(
    State(state): State<ApiState>,
    Json(req): Json<PpsHealthRequest>,
) -> Result<Json<PpsHealthResponse>, ApiError> {
    auth::check_token(&state, &req.token)?;
    let started = Instant::now();

    let result = pps_health_inner(&state).await;

    log_trace(&state, session_id_of(&req.session_id), "pps_health", json!({}), started).await;

    Ok(Json(result?))
}

async fn pps_health_inner(state: &ApiState) -> Result<PpsHealthResponse, ApiError> {
    let db_ok = state.db.client.query("RETURN true").await.is_ok();
    let unsummarized = Turn::count_unsummarized(&state.db).await?;
    let uningested = Turn::count_ungraphed(&state.db).await?;
    let graph_stats = GraphIngestionBatch::stats(&state.db).await?;
    let crystals = VectorDocument::count_distinct_docs_in_category(&state.db, documents::CRYSTAL_COLLECTION).await?;
    let word_photos =
        VectorDocument::count_distinct_docs_in_category(&state.db, documents::WORD_PHOTO_COLLECTION).await?;
    let tech_rag_docs =
        VectorDocument::count_distinct_docs_in_category(&state.db, documents::TECH_RAG_COLLECTION).await?;

    Ok(PpsHealthResponse {
        success: true,
        db_ok,
        unsummarized,
        uningested,
        graph_stats,
        crystals,
        word_photos,
        tech_rag_docs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_openai::{config::OpenAIConfig, Client};
    use axum::extract::State as AxumState;
    use common::{storage::db::SurrealDbClient, utils::config::test_config};
    use ingestion_pipeline::IngestionPipeline;
    use uuid::Uuid;

    async fn test_state() -> ApiState {
        let db = Arc::new(
            SurrealDbClient::memory("rpc_test_ns", &Uuid::new_v4().to_string())
                .await
                .expect("in-memory db"),
        );

        let config = test_config();
        let openai_client = Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));
        let ingestion_pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&openai_client),
        ));

        ApiState {
            db,
            config,
            openai_client,
            ingestion_pipeline,
        }
    }

    #[tokio::test]
    async fn store_message_dedupes_on_external_id() {
        let state = test_state().await;
        let req = StoreMessageRequest {
            token: "test-token".into(),
            content: "hello".into(),
            author_name: "jeff".into(),
            channel: "terminal".into(),
            is_own_utterance: false,
            session_id: Some("session-1".into()),
            external_id: Some("ext-1".into()),
        };

        let first = store_message(AxumState(state.clone()), Json(req.clone()))
            .await
            .expect("first store");
        assert!(!first.deduped);

        let second = store_message(AxumState(state.clone()), Json(req))
            .await
            .expect("second store");
        assert!(second.deduped);
        assert_eq!(second.turn.id, first.turn.id);
    }

    #[tokio::test]
    async fn store_message_rejects_bad_token() {
        let state = test_state().await;
        let req = StoreMessageRequest {
            token: "wrong".into(),
            content: "hello".into(),
            author_name: "jeff".into(),
            channel: "terminal".into(),
            is_own_utterance: false,
            session_id: None,
            external_id: None,
        };

        let result = store_message(AxumState(state), Json(req)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn ingest_batch_to_graphiti_reports_zeros_on_empty_backlog() {
        let state = test_state().await;
        let req = IngestBatchToGraphitiRequest {
            token: "test-token".into(),
            batch_size: 10,
            session_id: None,
        };

        let response = ingest_batch_to_graphiti(AxumState(state), Json(req))
            .await
            .expect("ingest call");
        assert_eq!(response.ingested, 0);
        assert_eq!(response.failed, 0);
        assert_eq!(response.remaining, 0);
    }

    #[tokio::test]
    async fn pps_health_reports_empty_system() {
        let state = test_state().await;
        let req = PpsHealthRequest {
            token: "test-token".into(),
            session_id: None,
        };

        let response = pps_health(AxumState(state), Json(req)).await.expect("health");
        assert!(response.db_ok);
        assert_eq!(response.unsummarized, 0);
        assert_eq!(response.uningested, 0);
    }
}
