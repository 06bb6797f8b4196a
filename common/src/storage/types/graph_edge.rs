use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

/// Predicate used to mark a fact as superseded by a newer one rather than
/// physically deleting it. Filtered out at query time in every search path;
/// never special-cased on write.
pub const IS_DUPLICATE_OF: &str = "IS_DUPLICATE_OF";

stored_object!(GraphEdge, "graph_edge", {
    group_id: String,
    subject_name: String,
    object_name: String,
    predicate: String,
    fact_text: String,
    #[serde(default)]
    valid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    source_labels: Vec<String>,
    #[serde(default)]
    target_labels: Vec<String>,
    embedding: Vec<f32>
});

/// A graph fact ranked by a convex combination of semantic similarity and
/// graph proximity, returned from `search_ranked`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdgeRanked {
    pub edge: GraphEdge,
    pub similarity: f32,
}

impl GraphEdge {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group_id: String,
        subject_name: String,
        object_name: String,
        predicate: String,
        fact_text: String,
        valid_at: Option<chrono::DateTime<Utc>>,
        source_labels: Vec<String>,
        target_labels: Vec<String>,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            group_id: group_id.to_lowercase(),
            subject_name,
            object_name,
            predicate,
            fact_text,
            valid_at,
            source_labels,
            target_labels,
            embedding,
        }
    }

    pub async fn store(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self.clone()).await?;
        Ok(self)
    }

    /// Semantic vector search over live (non-`IS_DUPLICATE_OF`) facts for a group.
    pub async fn vector_search(
        db: &SurrealDbClient,
        group_id: &str,
        query_embedding: Vec<f32>,
        take: usize,
    ) -> Result<Vec<GraphEdgeRanked>, AppError> {
        #[derive(serde::Deserialize)]
        struct Row {
            #[serde(flatten)]
            edge: GraphEdge,
            similarity: f32,
        }

        let sql = format!(
            r#"
            SELECT *, vector::similarity::cosine(embedding, $embedding) AS similarity
            FROM {table}
            WHERE group_id = $group_id
              AND predicate != $duplicate_predicate
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
            .bind(("group_id", group_id.to_lowercase()))
            .bind(("embedding", query_embedding))
            .bind(("duplicate_predicate", IS_DUPLICATE_OF))
            .await?
            .take(0)?;

        Ok(rows
            .into_iter()
            .map(|row| GraphEdgeRanked {
                edge: row.edge,
                similarity: row.similarity,
            })
            .collect())
    }

    /// Facts directly touching a named entity, for graph-proximity expansion.
    pub async fn facts_touching(
        db: &SurrealDbClient,
        group_id: &str,
        entity_name: &str,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE group_id = $group_id
                   AND predicate != $duplicate_predicate
                   AND (subject_name = $name OR object_name = $name)
                 ORDER BY created_at DESC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("group_id", group_id.to_lowercase()))
            .bind(("name", entity_name.to_owned()))
            .bind(("duplicate_predicate", IS_DUPLICATE_OF))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }

    /// Marks `self` as superseded by `new_edge_id`, leaving the row in place
    /// but excluded from every retrieval path (curator dedup).
    pub async fn mark_duplicate_of(
        &self,
        new_edge_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::thing($table, $id)
                 SET predicate = $duplicate_predicate,
                     fact_text = $fact_text,
                     updated_at = time::now();",
            )
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("duplicate_predicate", IS_DUPLICATE_OF))
            .bind(("fact_text", format!("superseded by {new_edge_id}")))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn delete_by_id(id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        db.delete_item::<Self>(id).await?;
        Ok(())
    }

    /// All live facts for a group, for `repair_jina_records` to walk and
    /// re-embed after an embedding-provider swap.
    pub async fn all_for_group(db: &SurrealDbClient, group_id: &str) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query("SELECT * FROM type::table($table) WHERE group_id = $group_id;")
            .bind(("table", Self::table_name()))
            .bind(("group_id", group_id.to_lowercase()))
            .await?
            .take(0)?)
    }

    /// Overwrites a fact's embedding in place, leaving its text untouched.
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_embedding(seed: f32) -> Vec<f32> {
        vec![seed, 1.0 - seed, 0.0]
    }

    #[tokio::test]
    async fn vector_search_excludes_duplicates() {
        let db = SurrealDbClient::memory("graph_edge_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        let edge = GraphEdge::new(
            "agent".into(),
            "alice".into(),
            "rust".into(),
            "LIKES".into(),
            "alice likes rust".into(),
            None,
            vec!["Person".into()],
            vec!["Topic".into()],
            unit_embedding(0.9),
        )
        .store(&db)
        .await
        .expect("store edge");

        edge.mark_duplicate_of("some-newer-edge", &db)
            .await
            .expect("mark duplicate");

        let results = GraphEdge::vector_search(&db, "agent", unit_embedding(0.9), 5)
            .await
            .expect("vector search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn facts_touching_matches_subject_or_object() {
        let db = SurrealDbClient::memory("graph_edge_touch_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        GraphEdge::new(
            "agent".into(),
            "alice".into(),
            "rust".into(),
            "LIKES".into(),
            "alice likes rust".into(),
            None,
            vec!["Person".into()],
            vec!["Topic".into()],
            unit_embedding(0.5),
        )
        .store(&db)
        .await
        .expect("store edge");

        let as_subject = GraphEdge::facts_touching(&db, "agent", "alice", 10)
            .await
            .expect("facts touching alice");
        assert_eq!(as_subject.len(), 1);

        let as_object = GraphEdge::facts_touching(&db, "agent", "rust", 10)
            .await
            .expect("facts touching rust");
        assert_eq!(as_object.len(), 1);
    }
}
