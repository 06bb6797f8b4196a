use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{graph_edge::GraphEdge, graph_node::GraphNode, turn::Turn},
    },
};

use super::enrichment_result::LLMEnrichmentResult;
use crate::utils::llm_instructions::{get_graph_extraction_schema, GRAPH_EXTRACTION_SYSTEM_MESSAGE};

/// Chat model used for graph-entity/fact extraction. Kept as a constant
/// rather than a per-request config knob; the system carries one active
/// entity per process (`spec.md` §1) and this model choice is part of its
/// fixed processing configuration.
const EXTRACTION_MODEL: &str = "gpt-4o-mini";

#[async_trait]
pub trait PipelineServices: Send + Sync {
    /// Recent graph nodes for the group, given to the extraction prompt so
    /// the model can reuse known entity names instead of minting aliases.
    async fn sample_existing_entities(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, AppError>;

    async fn run_extraction(
        &self,
        episode_text: &str,
        existing_entities: &[GraphNode],
    ) -> Result<LLMEnrichmentResult, AppError>;

    async fn convert_extraction(
        &self,
        group_id: &str,
        extraction: LLMEnrichmentResult,
        entity_concurrency: usize,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), AppError>;

    async fn store_edges(&self, edges: &[GraphEdge], tuning: &super::config::IngestionTuning)
        -> Result<(), AppError>;
}

pub struct DefaultPipelineServices {
    db: Arc<SurrealDbClient>,
    openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
}

impl DefaultPipelineServices {
    pub fn new(
        db: Arc<SurrealDbClient>,
        openai_client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
    ) -> Self {
        Self { db, openai_client }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn sample_existing_entities(
        &self,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, AppError> {
        GraphNode::recent(&self.db, group_id, limit).await
    }

    async fn run_extraction(
        &self,
        episode_text: &str,
        existing_entities: &[GraphNode],
    ) -> Result<LLMEnrichmentResult, AppError> {
        let known_names: Vec<&str> = existing_entities.iter().map(|n| n.name.as_str()).collect();
        let user_message = format!(
            "Known entities already in the graph for this group:\n{}\n\nEpisode:\n{episode_text}",
            serde_json::to_string(&known_names).unwrap_or_default()
        );

        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Entities and facts extracted from a conversational episode".into()),
                name: "graph_extraction".into(),
                schema: Some(get_graph_extraction_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(EXTRACTION_MODEL)
            .messages([
                ChatCompletionRequestSystemMessage::from(GRAPH_EXTRACTION_SYSTEM_MESSAGE).into(),
                ChatCompletionRequestUserMessage::from(user_message).into(),
            ])
            .response_format(response_format)
            .build()?;

        let response = self.openai_client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_ref())
            .ok_or_else(|| AppError::LLMParsing("No content found in LLM response".into()))?;

        serde_json::from_str::<LLMEnrichmentResult>(content).map_err(|e| {
            AppError::LLMParsing(format!("Failed to parse LLM response into extraction: {e}"))
        })
    }

    async fn convert_extraction(
        &self,
        group_id: &str,
        extraction: LLMEnrichmentResult,
        entity_concurrency: usize,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), AppError> {
        extraction
            .to_database_entities(group_id, &self.openai_client, &self.db, entity_concurrency)
            .await
    }

    async fn store_edges(
        &self,
        edges: &[GraphEdge],
        tuning: &super::config::IngestionTuning,
    ) -> Result<(), AppError> {
        for edge in edges {
            store_edge_with_retry(&self.db, edge.clone(), tuning).await?;
        }
        Ok(())
    }
}

async fn store_edge_with_retry(
    db: &SurrealDbClient,
    edge: GraphEdge,
    tuning: &super::config::IngestionTuning,
) -> Result<(), AppError> {
    let mut backoff_ms = tuning.graph_initial_backoff_ms;
    let last_attempt = tuning.graph_store_attempts.saturating_sub(1);

    for attempt in 0..tuning.graph_store_attempts {
        match edge.clone().store(db).await {
            Ok(_) => return Ok(()),
            Err(err) => {
                if is_retryable_conflict(&err) && attempt < last_attempt {
                    tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                    backoff_ms = backoff_ms.saturating_mul(2).min(tuning.graph_max_backoff_ms);
                    continue;
                }
                return Err(err);
            }
        }
    }

    Err(AppError::InternalError(
        "failed to store graph edge after retries".into(),
    ))
}

fn is_retryable_conflict(error: &AppError) -> bool {
    error
        .to_string()
        .contains("Failed to commit transaction due to a read or write conflict")
}

/// Builds the combined episode text the extraction prompt sees for a single
/// turn: the turn's own content, with enough framing (channel/author) for
/// pronoun resolution to not be hopeless.
pub fn episode_text_for_turn(turn: &Turn) -> String {
    format!("[{}] {}: {}", turn.channel, turn.author_name, turn.content)
}
