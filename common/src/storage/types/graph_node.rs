use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(GraphNode, "graph_node", {
    group_id: String,
    name: String,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    summary: String
});

impl GraphNode {
    pub fn new(group_id: String, name: String, labels: Vec<String>, summary: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            group_id: group_id.to_lowercase(),
            name,
            labels,
            summary,
        }
    }

    /// Find-or-create by (group_id, name), case-sensitive on name but the
    /// group is always normalized to lowercase, matching the curator's entity
    /// identity rule. An existing node with no summary is backfilled from
    /// `summary` rather than overwritten once it has one.
    pub async fn find_or_create(
        group_id: &str,
        name: &str,
        labels: Vec<String>,
        summary: &str,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let group_id = group_id.to_lowercase();
        let existing: Option<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE group_id = $group_id AND name = $name
                 LIMIT 1;",
            )
            .bind(("table", Self::table_name()))
            .bind(("group_id", group_id.clone()))
            .bind(("name", name.to_owned()))
            .await?
            .take(0)?;

        if let Some(mut existing) = existing {
            if existing.summary.is_empty() && !summary.is_empty() {
                existing.summary = summary.to_owned();
                existing.updated_at = Utc::now();
                db.client
                    .query(
                        "UPDATE type::thing($table, $id)
                         SET summary = $summary, updated_at = time::now();",
                    )
                    .bind(("table", Self::table_name()))
                    .bind(("id", existing.id.clone()))
                    .bind(("summary", existing.summary.clone()))
                    .await?
                    .check()?;
            }
            return Ok(existing);
        }

        let node = Self::new(group_id, name.to_owned(), labels, summary.to_owned());
        db.store_item(node.clone()).await?;
        Ok(node)
    }

    /// Number of live (non-`IS_DUPLICATE_OF`) edges touching this node,
    /// used to pick the canonical node among same-named duplicates.
    pub async fn connection_count(&self, db: &SurrealDbClient) -> Result<usize, AppError> {
        use super::graph_edge::{GraphEdge, IS_DUPLICATE_OF};

        #[derive(serde::Deserialize)]
        struct Count {
            count: usize,
        }

        let result: Option<Count> = db
            .client
            .query(
                "SELECT count() AS count FROM type::table($table)
                 WHERE group_id = $group_id
                   AND predicate != $duplicate_predicate
                   AND (subject_name = $name OR object_name = $name)
                 GROUP ALL;",
            )
            .bind(("table", GraphEdge::table_name()))
            .bind(("group_id", self.group_id.clone()))
            .bind(("name", self.name.clone()))
            .bind(("duplicate_predicate", IS_DUPLICATE_OF))
            .await?
            .take(0)?;

        Ok(result.map_or(0, |c| c.count))
    }

    /// Most recently created nodes for a group, used to seed extraction
    /// prompts with entity names the model should reuse instead of aliasing.
    pub async fn recent(
        db: &SurrealDbClient,
        group_id: &str,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE group_id = $group_id
                 ORDER BY created_at DESC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("group_id", group_id.to_lowercase()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }

    pub async fn search_by_name(
        db: &SurrealDbClient,
        group_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE group_id = $group_id
                   AND string::lowercase(name) CONTAINS string::lowercase($query)
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("group_id", group_id.to_lowercase()))
            .bind(("query", query.to_owned()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }

    pub async fn delete_by_id(id: &str, db: &SurrealDbClient) -> Result<(), AppError> {
        db.delete_item::<Self>(id).await?;
        Ok(())
    }
}
