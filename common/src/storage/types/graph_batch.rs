use uuid::Uuid;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, types::turn::Turn},
    stored_object,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum GraphIngestionStatus {
    Pending,
    InFlight,
    Succeeded,
    /// Not everything in the batch made it into the graph; still terminal.
    SucceededPartial,
    Failed,
}

stored_object!(GraphIngestionBatch, "graph_batch", {
    turn_start_id: String,
    turn_end_id: String,
    turn_count: usize,
    channels: Vec<String>,
    status: GraphIngestionStatus,
    #[serde(default)]
    error_category: Option<String>,
    #[serde(default)]
    error_message: Option<String>
});

impl GraphIngestionBatch {
    pub fn new(turn_start_id: String, turn_end_id: String, turn_count: usize, channels: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            turn_start_id,
            turn_end_id,
            turn_count,
            channels,
            status: GraphIngestionStatus::Pending,
            error_category: None,
            error_message: None,
        }
    }

    pub async fn create_pending(
        turn_start_id: String,
        turn_end_id: String,
        turn_count: usize,
        channels: Vec<String>,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let batch = Self::new(turn_start_id, turn_end_id, turn_count, channels);
        db.store_item(batch.clone()).await?;
        Ok(batch)
    }

    /// Atomically claims up to `limit` oldest ungraphed turns (marking their
    /// `graphiti_batch_id` so no other tick can claim them) and creates a
    /// `Pending` batch row covering exactly that set. Returns `None` if
    /// there was nothing left to claim. This is the turn-level half of
    /// `spec.md` §4.5's exactly-once invariant; `claim_next_pending` below
    /// is the batch-level half.
    pub async fn claim_turns_and_create_pending(
        db: &SurrealDbClient,
        limit: usize,
    ) -> Result<Option<(Self, Vec<Turn>)>, AppError> {
        let batch_id = Uuid::new_v4().to_string();
        let turns = Turn::claim_for_graph_batch(db, &batch_id, limit).await?;
        if turns.is_empty() {
            return Ok(None);
        }

        let mut channels: Vec<String> = Vec::new();
        for turn in &turns {
            if !channels.contains(&turn.channel) {
                channels.push(turn.channel.clone());
            }
        }

        let mut batch = Self::new(
            turns[0].id.clone(),
            turns[turns.len() - 1].id.clone(),
            turns.len(),
            channels,
        );
        batch.id = batch_id;
        db.store_item(batch.clone()).await?;

        Ok(Some((batch, turns)))
    }

    /// Atomically claims the oldest pending batch by flipping it to `InFlight`
    /// in a single `UPDATE ... WHERE status = 'Pending' ... RETURNING` statement,
    /// so two concurrent schedulers can never claim the same batch twice.
    pub async fn claim_next_pending(db: &SurrealDbClient) -> Result<Option<Self>, AppError> {
        let candidate: Option<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE status = 'Pending'
                 ORDER BY created_at ASC
                 LIMIT 1;",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        let Some(candidate) = candidate else {
            return Ok(None);
        };

        let claimed: Option<Self> = db
            .client
            .query(
                "UPDATE type::thing($table, $id)
                 SET status = 'InFlight', updated_at = time::now()
                 WHERE status = 'Pending'
                 RETURN AFTER;",
            )
            .bind(("table", Self::table_name()))
            .bind(("id", candidate.id.clone()))
            .await?
            .take(0)?;

        Ok(claimed)
    }

    pub async fn mark_succeeded(
        &self,
        partial: bool,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        let status = if partial {
            GraphIngestionStatus::SucceededPartial
        } else {
            GraphIngestionStatus::Succeeded
        };
        db.client
            .query(
                "UPDATE type::thing($table, $id)
                 SET status = $status, updated_at = time::now();",
            )
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("status", status))
            .await?
            .check()?;
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        error_category: &str,
        error_message: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        db.client
            .query(
                "UPDATE type::thing($table, $id)
                 SET status = 'Failed', error_category = $category, error_message = $message, updated_at = time::now();",
            )
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("category", error_category.to_owned()))
            .bind(("message", error_message.to_owned()))
            .await?
            .check()?;
        Ok(())
    }

    /// Counts and most recent failure, for the `graphiti_ingestion_stats` endpoint.
    pub async fn stats(db: &SurrealDbClient) -> Result<GraphIngestionStats, AppError> {
        #[derive(serde::Deserialize)]
        struct Row {
            status: GraphIngestionStatus,
            count: usize,
        }

        let rows: Vec<Row> = db
            .client
            .query(
                "SELECT status, count() AS count FROM type::table($table) GROUP BY status;",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;

        let mut stats = GraphIngestionStats::default();
        for row in rows {
            match row.status {
                GraphIngestionStatus::Pending => stats.pending = row.count,
                GraphIngestionStatus::InFlight => stats.in_flight = row.count,
                GraphIngestionStatus::Succeeded => stats.succeeded += row.count,
                GraphIngestionStatus::SucceededPartial => stats.succeeded += row.count,
                GraphIngestionStatus::Failed => stats.failed = row.count,
            }
        }
        Ok(stats)
    }

    pub async fn recent_failed(db: &SurrealDbClient, limit: usize) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE status = 'Failed'
                 ORDER BY updated_at DESC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct GraphIngestionStats {
    pub pending: usize,
    pub in_flight: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_next_pending_is_exclusive() {
        let db = SurrealDbClient::memory("graph_batch_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        GraphIngestionBatch::create_pending(
            "t1".into(),
            "t10".into(),
            10,
            vec!["general".into()],
            &db,
        )
        .await
        .expect("create pending batch");

        let claimed = GraphIngestionBatch::claim_next_pending(&db)
            .await
            .expect("claim")
            .expect("a batch was pending");
        assert_eq!(claimed.status, GraphIngestionStatus::InFlight);

        let second_claim = GraphIngestionBatch::claim_next_pending(&db)
            .await
            .expect("claim again");
        assert!(second_claim.is_none());
    }

    #[tokio::test]
    async fn claim_turns_and_create_pending_marks_turns_immediately() {
        let db = SurrealDbClient::memory("graph_batch_claim_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        for i in 0..5 {
            Turn::create_and_store(
                "general".into(),
                "alice".into(),
                false,
                format!("turn {i}"),
                None,
                None,
                &db,
            )
            .await
            .expect("store turn");
        }

        let (batch, turns) = GraphIngestionBatch::claim_turns_and_create_pending(&db, 3)
            .await
            .expect("claim")
            .expect("turns were available to claim");
        assert_eq!(turns.len(), 3);
        assert_eq!(batch.turn_count, 3);
        assert_eq!(batch.status, GraphIngestionStatus::Pending);

        assert_eq!(Turn::count_ungraphed(&db).await.unwrap(), 2);

        let (_, second_turns) = GraphIngestionBatch::claim_turns_and_create_pending(&db, 3)
            .await
            .expect("claim")
            .expect("remaining turns were available to claim");
        assert_eq!(second_turns.len(), 2);
    }

    #[tokio::test]
    async fn mark_failed_records_category_and_message() {
        let db = SurrealDbClient::memory("graph_batch_fail_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        let batch = GraphIngestionBatch::create_pending(
            "t1".into(),
            "t2".into(),
            2,
            vec!["general".into()],
            &db,
        )
        .await
        .expect("create pending batch");
        let batch = GraphIngestionBatch::claim_next_pending(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.status, GraphIngestionStatus::InFlight);

        batch
            .mark_failed("rate_limit", "429 Too Many Requests", &db)
            .await
            .expect("mark failed");

        let stats = GraphIngestionBatch::stats(&db).await.expect("stats");
        assert_eq!(stats.failed, 1);

        let failed = GraphIngestionBatch::recent_failed(&db, 10)
            .await
            .expect("recent_failed");
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].error_category.as_deref(), Some("rate_limit"));
    }
}
