use async_openai::types::CreateEmbeddingRequestArgs;
use tracing::debug;

use crate::error::AppError;

/// Default embedding model, matching the HNSW dimension every index in
/// `storage::indexes` is built for (`storage::db::EMBEDDING_DIMENSION`).
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Generates an embedding vector for the given input text using the configured
/// provider's embedding model.
///
/// This takes a text input and converts it into a numerical vector
/// representation (embedding) used for semantic similarity comparisons and
/// HNSW vector search across the graph-fact and word-photo/crystal/tech-rag
/// stores.
///
/// # Errors
///
/// Returns `AppError::Embedding` if the request fails, or
/// `AppError::LLMParsing` if no embedding data is returned.
pub async fn generate_embedding(
    client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    input: &str,
) -> Result<Vec<f32>, AppError> {
    generate_embedding_with_params(
        client,
        input,
        DEFAULT_EMBEDDING_MODEL,
        crate::storage::db::EMBEDDING_DIMENSION as u32,
    )
    .await
}

/// Generates an embedding vector using a specific model and dimension.
///
/// Used by `repair_jina_records` when re-embedding existing rows under a new
/// provider/model, where the target model and dimension are known ahead of
/// time rather than read from the default configuration.
pub async fn generate_embedding_with_params(
    client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    input: &str,
    model: &str,
    dimensions: u32,
) -> Result<Vec<f32>, AppError> {
    let request = CreateEmbeddingRequestArgs::default()
        .model(model)
        .input([input])
        .dimensions(dimensions)
        .build()?;

    let response = client.embeddings().create(request).await?;

    let embedding = response
        .data
        .first()
        .ok_or_else(|| AppError::LLMParsing("No embedding data received from API".into()))?
        .embedding
        .clone();

    debug!(
        "Embedding was created with {:?} dimensions",
        embedding.len()
    );

    Ok(embedding)
}
