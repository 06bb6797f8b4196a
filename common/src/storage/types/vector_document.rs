use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Metadata carried by every chunk in the shared word-photo / crystal /
/// tech-doc-RAG / inventory vector store. `category` distinguishes the four
/// logical collections sharing this one table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VectorDocumentMetadata {
    pub category: String,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub doc_type: Option<String>,
    #[serde(default)]
    pub crystal_num: Option<u32>,
}

stored_object!(VectorDocument, "vector_document", {
    collection: String,
    doc_id: String,
    chunk_num: usize,
    content: String,
    content_hash: String,
    metadata: VectorDocumentMetadata,
    embedding: Vec<f32>
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocumentRanked {
    pub document: VectorDocument,
    pub similarity: f32,
}

impl VectorDocument {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        collection: String,
        doc_id: String,
        chunk_num: usize,
        content: String,
        content_hash: String,
        metadata: VectorDocumentMetadata,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            collection,
            doc_id,
            chunk_num,
            content,
            content_hash,
            metadata,
            embedding,
        }
    }

    pub async fn store(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self.clone()).await?;
        Ok(self)
    }

    pub async fn vector_search(
        db: &SurrealDbClient,
        collection: &str,
        query_embedding: Vec<f32>,
        take: usize,
    ) -> Result<Vec<VectorDocumentRanked>, AppError> {
        #[derive(serde::Deserialize)]
        struct Row {
            #[serde(flatten)]
            document: VectorDocument,
            similarity: f32,
        }

        let sql = format!(
            r#"
            SELECT *, vector::similarity::cosine(embedding, $embedding) AS similarity
            FROM {table}
            WHERE collection = $collection
              AND embedding <|{take},100|> $embedding
            ORDER BY similarity DESC
            LIMIT {take};
            "#,
            table = Self::table_name(),
            take = take,
        );

        let rows: Vec<Row> = db
            .client
            .query(sql)
            .bind(("collection", collection.to_owned()))
            .bind(("embedding", query_embedding))
            .await?
            .take(0)?;

        Ok(rows
            .into_iter()
            .map(|row| VectorDocumentRanked {
                document: row.document,
                similarity: row.similarity,
            })
            .collect())
    }

    /// Existing chunk hashes for a document, used to decide whether
    /// re-ingestion is a no-op (content unchanged) or requires deleting
    /// stale chunks before writing fresh ones.
    pub async fn content_hashes_for_doc(
        db: &SurrealDbClient,
        collection: &str,
        doc_id: &str,
    ) -> Result<Vec<String>, AppError> {
        #[derive(serde::Deserialize)]
        struct Row {
            content_hash: String,
        }
        let rows: Vec<Row> = db
            .client
            .query(
                "SELECT content_hash FROM type::table($table)
                 WHERE collection = $collection AND doc_id = $doc_id;",
            )
            .bind(("table", Self::table_name()))
            .bind(("collection", collection.to_owned()))
            .bind(("doc_id", doc_id.to_owned()))
            .await?
            .take(0)?;
        Ok(rows.into_iter().map(|r| r.content_hash).collect())
    }

    /// Delete every chunk belonging to a document, ahead of re-ingesting it
    /// under a changed content hash.
    pub async fn delete_by_doc_id(
        db: &SurrealDbClient,
        collection: &str,
        doc_id: &str,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "DELETE type::table($table)
                 WHERE collection = $collection AND doc_id = $doc_id;",
            )
            .bind(("table", Self::table_name()))
            .bind(("collection", collection.to_owned()))
            .bind(("doc_id", doc_id.to_owned()))
            .await?
            .check()?;
        Ok(())
    }

    /// Count of distinct documents (not chunks) in a category, used by
    /// ambient-recall's startup manifest.
    pub async fn count_distinct_docs_in_category(
        db: &SurrealDbClient,
        category: &str,
    ) -> Result<usize, AppError> {
        #[derive(serde::Deserialize)]
        struct Row {
            doc_id: String,
        }
        let rows: Vec<Row> = db
            .client
            .query(
                "SELECT doc_id FROM type::table($table)
                 WHERE metadata.category = $category;",
            )
            .bind(("table", Self::table_name()))
            .bind(("category", category.to_owned()))
            .await?
            .take(0)?;
        let distinct: std::collections::HashSet<String> =
            rows.into_iter().map(|r| r.doc_id).collect();
        Ok(distinct.len())
    }

    /// Overwrites a chunk's embedding in place, used by `repair_jina_records`
    /// to re-embed existing rows after an embedding-provider swap without
    /// touching their content, hash, or metadata.
    pub async fn update_embedding(
        db: &SurrealDbClient,
        id: &str,
        embedding: Vec<f32>,
    ) -> Result<(), AppError> {
        db.client
            .query("UPDATE type::thing($table, $id) SET embedding = $embedding, updated_at = time::now();")
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_owned()))
            .bind(("embedding", embedding))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn list_by_category(
        db: &SurrealDbClient,
        category: &str,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE metadata.category = $category
                 ORDER BY created_at DESC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("category", category.to_owned()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }
}
