use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SummaryType {
    Work,
    Social,
    Technical,
    Mixed,
}

stored_object!(Summary, "summary", {
    summary_text: String,
    start_turn_id: String,
    end_turn_id: String,
    message_count: usize,
    channels: Vec<String>,
    summary_type: SummaryType
});

impl Summary {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        summary_text: String,
        start_turn_id: String,
        end_turn_id: String,
        message_count: usize,
        channels: Vec<String>,
        summary_type: SummaryType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            summary_text,
            start_turn_id,
            end_turn_id,
            message_count,
            channels,
            summary_type,
        }
    }

    pub async fn store(self, db: &SurrealDbClient) -> Result<Self, AppError> {
        db.store_item(self.clone()).await?;
        Ok(self)
    }

    /// Creates the summary row and marks the covered turns in one
    /// transaction so a failure midway never leaves turns pointing at a
    /// summary that doesn't exist (`spec.md` §4.2).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_and_store(
        summary_text: String,
        turn_ids: &[String],
        start_turn_id: String,
        end_turn_id: String,
        channels: Vec<String>,
        summary_type: SummaryType,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let summary = Self::new(
            summary_text,
            start_turn_id,
            end_turn_id,
            turn_ids.len(),
            channels,
            summary_type,
        );

        const CREATE_SUMMARY_AND_MARK_TURNS: &str = r"
            BEGIN TRANSACTION;
            LET $summary = $summary;
            LET $turn_ids = $turn_ids;

            CREATE type::thing('summary', $summary.id) CONTENT $summary;

            FOR $turn_id IN $turn_ids {
                UPDATE type::thing('turn', $turn_id) SET summary_id = $summary.id;
            };

            COMMIT TRANSACTION;
        ";

        db.client
            .query(CREATE_SUMMARY_AND_MARK_TURNS)
            .bind(("summary", summary.clone()))
            .bind(("turn_ids", turn_ids.to_vec()))
            .await?
            .check()?;

        Ok(summary)
    }

    /// Total number of summaries ever created. Backs ambient-recall's
    /// startup-mode manifest line.
    pub async fn count_total(db: &SurrealDbClient) -> Result<usize, AppError> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: usize,
        }
        let rows: Vec<CountRow> = db
            .client
            .query("SELECT count() AS count FROM type::table($table) GROUP ALL;")
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// The `K` most recent summaries, newest first. Backs ambient-recall's
    /// startup mode manifest.
    pub async fn get_recent(db: &SurrealDbClient, limit: usize) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 ORDER BY created_at DESC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }

    /// Substring search over summary text, newest matches first.
    pub async fn search_text(
        db: &SurrealDbClient,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE string::lowercase(summary_text) CONTAINS string::lowercase($query)
                 ORDER BY created_at DESC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("query", query.to_owned()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }

    /// Summaries produced after a given instant (used by `get_turns_since_summary`
    /// to resume an adapter from the last summary boundary it saw).
    pub async fn get_since(
        db: &SurrealDbClient,
        since: chrono::DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE created_at > $since
                 ORDER BY created_at ASC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("since", since))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }
}
