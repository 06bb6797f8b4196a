use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::vector_document::{VectorDocument, VectorDocumentMetadata},
    },
    utils::embedding::generate_embedding,
};
use sha2::{Digest, Sha256};
use text_splitter::TextSplitter;
use tracing::info;

/// Outcome of an `ingest` call, matching `spec.md` §4.4's shared contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum IngestAction {
    Indexed,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestResult {
    pub action: IngestAction,
    pub chunks: usize,
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Splits `content` into 500..2000-byte chunks, embeds each, and stores them
/// under `(collection, doc_id)`. Re-ingesting with an unchanged `content_hash`
/// is a no-op; a changed hash deletes all prior chunks for the doc first.
pub async fn ingest(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    collection: &str,
    doc_id: &str,
    content: &str,
    metadata: VectorDocumentMetadata,
) -> Result<IngestResult, AppError> {
    let hash = content_hash(content);
    let existing_hashes = VectorDocument::content_hashes_for_doc(db, collection, doc_id).await?;

    if !existing_hashes.is_empty() && existing_hashes.iter().all(|h| h == &hash) {
        return Ok(IngestResult {
            action: IngestAction::Unchanged,
            chunks: existing_hashes.len(),
        });
    }

    let action = if existing_hashes.is_empty() {
        IngestAction::Indexed
    } else {
        VectorDocument::delete_by_doc_id(db, collection, doc_id).await?;
        IngestAction::Updated
    };

    let splitter = TextSplitter::new(500..2000);
    let chunks: Vec<&str> = splitter.chunks(content).collect();

    for (chunk_num, chunk) in chunks.iter().enumerate() {
        let embedding = generate_embedding(openai_client, chunk).await?;
        let document = VectorDocument::new(
            collection.to_owned(),
            doc_id.to_owned(),
            chunk_num,
            (*chunk).to_owned(),
            hash.clone(),
            metadata.clone(),
            embedding,
        );
        document.store(db).await?;
    }

    info!(collection, doc_id, chunks = chunks.len(), ?action, "ingested document");

    Ok(IngestResult {
        action,
        chunks: chunks.len(),
    })
}
