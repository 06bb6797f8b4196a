use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::vector_document::{VectorDocument, VectorDocumentRanked},
    },
    utils::embedding::generate_embedding,
};

/// Word-photo / crystal / tech-RAG collections sharing the `vector_document`
/// table, distinguished by `metadata.category` (`spec.md` §4.4).
pub const CRYSTAL_COLLECTION: &str = "crystal";
pub const WORD_PHOTO_COLLECTION: &str = "word_photo";
pub const TECH_RAG_COLLECTION: &str = "tech_rag";

/// Embeds `query` and returns the top `limit` chunks from `collection`
/// ordered by cosine similarity.
pub async fn search(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    collection: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<VectorDocumentRanked>, AppError> {
    let query_embedding = generate_embedding(openai_client, query).await?;
    VectorDocument::vector_search(db, collection, query_embedding, limit).await
}

/// Most recently ingested crystals, newest first, for `get_crystals(count)`.
pub async fn recent_crystals(db: &SurrealDbClient, count: usize) -> Result<Vec<VectorDocument>, AppError> {
    VectorDocument::list_by_category(db, CRYSTAL_COLLECTION, count).await
}
