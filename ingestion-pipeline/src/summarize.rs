//! L1→L2 promotion: turns a backlog of raw turns into dense `Summary` rows
//! (`spec.md` §4.2/§4.5).

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
    },
    Client,
};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            summary::{Summary, SummaryType},
            turn::Turn,
        },
    },
    utils::config::SchedulerConfig,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::utils::{
    distinct_channels,
    llm_instructions::{get_summary_schema, SUMMARIZE_SYSTEM_MESSAGE},
    render_turns,
};

const SUMMARIZATION_MODEL: &str = "gpt-4o-mini";

/// Caps how many batches a single tick will drain, so a pathological backlog
/// can't turn one scheduler tick into an unbounded loop.
const MAX_BATCHES_PER_TICK: usize = 20;

#[derive(Debug, Deserialize)]
struct LLMSummaryResult {
    summary_text: String,
    summary_type: SummaryType,
}

/// Drains the unsummarized backlog down to `summarize_threshold`, one batch
/// of `summarize_batch` turns at a time, each batch persisted as its own
/// summary-plus-turn-marking transaction. Returns the number of turns
/// summarized this tick.
pub async fn summarize_tick(
    db: &SurrealDbClient,
    openai_client: &Client<OpenAIConfig>,
    config: &SchedulerConfig,
) -> Result<usize, AppError> {
    let mut total_summarized = 0;

    for _ in 0..MAX_BATCHES_PER_TICK {
        let backlog = Turn::count_unsummarized(db).await?;
        if backlog < config.summarize_threshold {
            break;
        }

        let batch = Turn::get_unsummarized(db, config.summarize_batch).await?;
        if batch.is_empty() {
            break;
        }

        let summary = summarize_batch(db, openai_client, &batch).await?;
        debug!(
            summary_id = %summary.id,
            turn_count = batch.len(),
            summary_type = ?summary.summary_type,
            "stored summary"
        );
        total_summarized += batch.len();
    }

    if total_summarized > 0 {
        info!(turns_summarized = total_summarized, "summarization tick complete");
    }

    Ok(total_summarized)
}

/// Summarizes up to `limit` oldest unsummarized turns immediately, ignoring
/// the scheduler's backlog threshold. Backs the manual `summarize_messages`
/// RPC endpoint. Returns `None` if there was nothing to summarize.
pub async fn summarize_now(
    db: &SurrealDbClient,
    openai_client: &Client<OpenAIConfig>,
    limit: usize,
) -> Result<Option<Summary>, AppError> {
    let batch = Turn::get_unsummarized(db, limit).await?;
    if batch.is_empty() {
        return Ok(None);
    }
    Ok(Some(summarize_batch(db, openai_client, &batch).await?))
}

async fn summarize_batch(
    db: &SurrealDbClient,
    openai_client: &Client<OpenAIConfig>,
    turns: &[Turn],
) -> Result<Summary, AppError> {
    let first = turns.first().ok_or_else(|| {
        AppError::InternalError("summarize_batch called with an empty turn slice".into())
    })?;
    let last = turns.last().expect("non-empty, checked above");

    let extraction = run_summarization(openai_client, &render_turns(turns)).await?;
    let turn_ids: Vec<String> = turns.iter().map(|turn| turn.id.clone()).collect();

    Summary::create_and_store(
        extraction.summary_text,
        &turn_ids,
        first.id.clone(),
        last.id.clone(),
        distinct_channels(turns),
        extraction.summary_type,
        db,
    )
    .await
}

async fn run_summarization(
    openai_client: &Client<OpenAIConfig>,
    turns_text: &str,
) -> Result<LLMSummaryResult, AppError> {
    let response_format = ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: Some("Dense summary of a window of conversational turns".into()),
            name: "turn_summary".into(),
            schema: Some(get_summary_schema()),
            strict: Some(true),
        },
    };

    let request = CreateChatCompletionRequestArgs::default()
        .model(SUMMARIZATION_MODEL)
        .messages([
            ChatCompletionRequestSystemMessage::from(SUMMARIZE_SYSTEM_MESSAGE).into(),
            ChatCompletionRequestUserMessage::from(turns_text.to_owned()).into(),
        ])
        .response_format(response_format)
        .build()?;

    let response = openai_client.chat().create(request).await?;

    let content = response
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_ref())
        .ok_or_else(|| AppError::LLMParsing("No content found in LLM response".into()))?;

    serde_json::from_str::<LLMSummaryResult>(content)
        .map_err(|e| AppError::LLMParsing(format!("Failed to parse LLM response into summary: {e}")))
}
