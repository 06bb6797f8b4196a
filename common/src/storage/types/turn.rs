use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(Turn, "turn", {
    channel: String,
    author_name: String,
    is_own_utterance: bool,
    content: String,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    summary_id: Option<String>,
    #[serde(default)]
    graphiti_batch_id: Option<String>
});

impl Turn {
    pub fn new(
        channel: String,
        author_name: String,
        is_own_utterance: bool,
        content: String,
        external_id: Option<String>,
        session_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            channel,
            author_name,
            is_own_utterance,
            content,
            external_id,
            session_id,
            summary_id: None,
            graphiti_batch_id: None,
        }
    }

    pub async fn create_and_store(
        channel: String,
        author_name: String,
        is_own_utterance: bool,
        content: String,
        external_id: Option<String>,
        session_id: Option<String>,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let turn = Self::new(
            channel,
            author_name,
            is_own_utterance,
            content,
            external_id,
            session_id,
        );
        db.store_item(turn.clone()).await?;
        Ok(turn)
    }

    /// Looks up a turn already stored under `(session_id, external_id)`, so
    /// `store_message` can no-op on a duplicate delivery instead of
    /// double-counting it in L1 (`spec.md` §8).
    pub async fn find_by_session_and_external_id(
        db: &SurrealDbClient,
        session_id: Option<&str>,
        external_id: &str,
    ) -> Result<Option<Self>, AppError> {
        let sql = match session_id {
            Some(_) => {
                "SELECT * FROM type::table($table)
                 WHERE external_id = $external_id AND session_id = $session_id
                 LIMIT 1;"
            }
            None => {
                "SELECT * FROM type::table($table)
                 WHERE external_id = $external_id
                 LIMIT 1;"
            }
        };

        let mut query = db
            .client
            .query(sql)
            .bind(("table", Self::table_name()))
            .bind(("external_id", external_id.to_owned()));

        if let Some(session_id) = session_id {
            query = query.bind(("session_id", session_id.to_owned()));
        }

        let rows: Vec<Self> = query.await?.take(0)?;
        Ok(rows.into_iter().next())
    }

    /// Turns not yet attached to a summary, oldest first. Backs the `T_s`/`B_s`
    /// summarization scheduler tick.
    pub async fn get_unsummarized(
        db: &SurrealDbClient,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE summary_id IS NONE
                 ORDER BY created_at ASC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }

    pub async fn count_unsummarized(db: &SurrealDbClient) -> Result<usize, AppError> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: usize,
        }
        let rows: Vec<CountRow> = db
            .client
            .query(
                "SELECT count() AS count FROM type::table($table)
                 WHERE summary_id IS NONE GROUP ALL;",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// Turns not yet ingested into the knowledge graph, oldest first. Backs
    /// the `T_g`/`B_g` graph-ingestion scheduler tick.
    pub async fn get_ungraphed(db: &SurrealDbClient, limit: usize) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE graphiti_batch_id IS NONE
                 ORDER BY created_at ASC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }

    pub async fn count_ungraphed(db: &SurrealDbClient) -> Result<usize, AppError> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: usize,
        }
        let rows: Vec<CountRow> = db
            .client
            .query(
                "SELECT count() AS count FROM type::table($table)
                 WHERE graphiti_batch_id IS NONE GROUP ALL;",
            )
            .bind(("table", Self::table_name()))
            .await?
            .take(0)?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// Most recently created turns, newest first. Backs ambient-recall's
    /// startup-mode manifest when the unsummarized backlog is small enough
    /// to show raw content rather than just a count.
    pub async fn recent(db: &SurrealDbClient, limit: usize) -> Result<Vec<Self>, AppError> {
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

    /// Turns created after a given instant, ordered oldest-first, optionally
    /// scoped to a channel. Backs `get_turns_since`.
    pub async fn get_since(
        db: &SurrealDbClient,
        since: chrono::DateTime<Utc>,
        channel: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        let sql = match channel {
            Some(_) => {
                "SELECT * FROM type::table($table)
                 WHERE created_at > $since AND channel = $channel
                 ORDER BY created_at ASC
                 LIMIT $limit;"
            }
            None => {
                "SELECT * FROM type::table($table)
                 WHERE created_at > $since
                 ORDER BY created_at ASC
                 LIMIT $limit;"
            }
        };

        let mut query = db
            .client
            .query(sql)
            .bind(("table", Self::table_name()))
            .bind(("since", since))
            .bind(("limit", limit));

        if let Some(channel) = channel {
            query = query.bind(("channel", channel.to_owned()));
        }

        Ok(query.await?.take(0)?)
    }

    /// Turns between `start_id` and `end_id` inclusive, ordered oldest
    /// first, validated as a legal summarization range: both ids must exist
    /// and every turn in between must still be unsummarized. Used by the
    /// `store_summary` endpoint to resolve an id pair into the row set
    /// `Summary::create_and_store` needs, failing before any write happens
    /// (`spec.md` §4.2).
    pub async fn get_range(
        db: &SurrealDbClient,
        start_id: &str,
        end_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        let start: Self = db
            .get_item(start_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("turn {start_id} not found")))?;
        let end: Self = db
            .get_item(end_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("turn {end_id} not found")))?;

        if start.created_at > end.created_at {
            return Err(AppError::Validation(
                "start_id must not be after end_id".into(),
            ));
        }

        let turns: Vec<Self> = db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE created_at >= $start AND created_at <= $end
                 ORDER BY created_at ASC;",
            )
            .bind(("table", Self::table_name()))
            .bind(("start", start.created_at))
            .bind(("end", end.created_at))
            .await?
            .take(0)?;

        if turns.is_empty() {
            return Err(AppError::Validation(
                "no turns found in the requested range".into(),
            ));
        }
        if turns.iter().any(|t| t.summary_id.is_some()) {
            return Err(AppError::Validation(
                "range includes turns that are already summarized".into(),
            ));
        }

        Ok(turns)
    }

    pub async fn mark_summarized(
        ids: &[String],
        summary_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        for id in ids {
            db.client
                .query("UPDATE type::thing($table, $id) SET summary_id = $summary_id;")
                .bind(("table", Self::table_name()))
                .bind(("id", id.clone()))
                .bind(("summary_id", summary_id.to_owned()))
                .await?
                .check()?;
        }
        Ok(())
    }

    /// Atomically claims up to `limit` oldest ungraphed turns for `batch_id`,
    /// one `UPDATE ... WHERE graphiti_batch_id IS NONE RETURN AFTER` per
    /// candidate so two concurrent scheduler ticks can never claim the same
    /// turn twice. Backs the turn-level half of the graph-ingestion
    /// exactly-once invariant (`spec.md` §4.5).
    pub async fn claim_for_graph_batch(
        db: &SurrealDbClient,
        batch_id: &str,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        let candidates = Self::get_ungraphed(db, limit).await?;
        let mut claimed = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let updated: Option<Self> = db
                .client
                .query(
                    "UPDATE type::thing($table, $id)
                     SET graphiti_batch_id = $batch_id, updated_at = time::now()
                     WHERE graphiti_batch_id IS NONE
                     RETURN AFTER;",
                )
                .bind(("table", Self::table_name()))
                .bind(("id", candidate.id))
                .bind(("batch_id", batch_id.to_owned()))
                .await?
                .take(0)?;

            if let Some(updated) = updated {
                claimed.push(updated);
            }
        }

        Ok(claimed)
    }

    /// Count of a claimed batch's turns that still carry its `batch_id`,
    /// i.e. survived `persist` without their marker being reverted. The
    /// complement against the batch's `turn_count` is the failed count.
    /// Backs `ingest_batch_to_graphiti`'s per-call ingested/failed split.
    pub async fn count_marked_for_batch(
        db: &SurrealDbClient,
        batch_id: &str,
    ) -> Result<usize, AppError> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: usize,
        }
        let rows: Vec<CountRow> = db
            .client
            .query(
                "SELECT count() AS count FROM type::table($table)
                 WHERE graphiti_batch_id = $batch_id GROUP ALL;",
            )
            .bind(("table", Self::table_name()))
            .bind(("batch_id", batch_id.to_owned()))
            .await?
            .take(0)?;
        Ok(rows.first().map_or(0, |r| r.count))
    }

    /// Turns still carrying `batch_id`'s marker, for `reset_ingestion_markers`
    /// to inspect and re-enqueue when a batch is stuck `InFlight` or `Failed`.
    pub async fn marked_for_batch(
        db: &SurrealDbClient,
        batch_id: &str,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE graphiti_batch_id = $batch_id
                 ORDER BY created_at ASC;",
            )
            .bind(("table", Self::table_name()))
            .bind(("batch_id", batch_id.to_owned()))
            .await?
            .take(0)?)
    }

    pub async fn mark_graphed(
        ids: &[String],
        batch_id: &str,
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        for id in ids {
            db.client
                .query("UPDATE type::thing($table, $id) SET graphiti_batch_id = $batch_id;")
                .bind(("table", Self::table_name()))
                .bind(("id", id.clone()))
                .bind(("batch_id", batch_id.to_owned()))
                .await?
                .check()?;
        }
        Ok(())
    }

    /// Clear the `graphiti_batch_id` marker on a set of turns, used by
    /// `reset_ingestion_markers` to re-enqueue turns for graph ingestion.
    pub async fn reset_graph_markers(
        ids: &[String],
        db: &SurrealDbClient,
    ) -> Result<(), AppError> {
        for id in ids {
            db.client
                .query("UPDATE type::thing($table, $id) SET graphiti_batch_id = NONE;")
                .bind(("table", Self::table_name()))
                .bind(("id", id.clone()))
                .await?
                .check()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unsummarized_and_ungraphed_queries_roundtrip() {
        let db = SurrealDbClient::memory("turn_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        let t1 = Turn::create_and_store(
            "general".into(),
            "alice".into(),
            false,
            "hello".into(),
            None,
            None,
            &db,
        )
        .await
        .expect("store turn");

        assert_eq!(Turn::count_unsummarized(&db).await.unwrap(), 1);
        assert_eq!(Turn::count_ungraphed(&db).await.unwrap(), 1);

        Turn::mark_summarized(&[t1.id.clone()], "summary-1", &db)
            .await
            .expect("mark summarized");
        assert_eq!(Turn::count_unsummarized(&db).await.unwrap(), 0);

        Turn::mark_graphed(&[t1.id.clone()], "batch-1", &db)
            .await
            .expect("mark graphed");
        assert_eq!(Turn::count_ungraphed(&db).await.unwrap(), 0);

        Turn::reset_graph_markers(&[t1.id.clone()], &db)
            .await
            .expect("reset markers");
        assert_eq!(Turn::count_ungraphed(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_since_filters_by_channel_and_time() {
        let db = SurrealDbClient::memory("turn_since_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        let marker = Utc::now();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        Turn::create_and_store(
            "general".into(),
            "alice".into(),
            false,
            "after".into(),
            None,
            None,
            &db,
        )
        .await
        .expect("store turn");

        Turn::create_and_store(
            "other-channel".into(),
            "bob".into(),
            false,
            "after-other-channel".into(),
            None,
            None,
            &db,
        )
        .await
        .expect("store turn");

        let results = Turn::get_since(&db, marker, Some("general"), 10)
            .await
            .expect("get_since");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].channel, "general");
    }

    #[tokio::test]
    async fn claim_for_graph_batch_is_exclusive() {
        let db = SurrealDbClient::memory("turn_claim_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        for i in 0..3 {
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

        let first_claim = Turn::claim_for_graph_batch(&db, "batch-1", 10)
            .await
            .expect("first claim");
        assert_eq!(first_claim.len(), 3);

        let second_claim = Turn::claim_for_graph_batch(&db, "batch-2", 10)
            .await
            .expect("second claim");
        assert!(
            second_claim.is_empty(),
            "already-claimed turns must not be claimed again"
        );
    }

    #[tokio::test]
    async fn find_by_session_and_external_id_prevents_double_counting() {
        let db = SurrealDbClient::memory("turn_dedup_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        Turn::create_and_store(
            "terminal".into(),
            "jeff".into(),
            false,
            "hello".into(),
            Some("ext-1".into()),
            Some("session-1".into()),
            &db,
        )
        .await
        .expect("store turn");

        let found = Turn::find_by_session_and_external_id(&db, Some("session-1"), "ext-1")
            .await
            .expect("lookup")
            .expect("turn should already exist");
        assert_eq!(found.content, "hello");

        let missing = Turn::find_by_session_and_external_id(&db, Some("session-1"), "ext-2")
            .await
            .expect("lookup");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn count_marked_for_batch_reflects_successful_subset() {
        let db = SurrealDbClient::memory("turn_batch_count_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        for i in 0..3 {
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

        let claimed = Turn::claim_for_graph_batch(&db, "batch-1", 10)
            .await
            .expect("claim");
        assert_eq!(Turn::count_marked_for_batch(&db, "batch-1").await.unwrap(), 3);

        Turn::reset_graph_markers(&[claimed[0].id.clone()], &db)
            .await
            .expect("reset one marker");
        assert_eq!(Turn::count_marked_for_batch(&db, "batch-1").await.unwrap(), 2);
    }
}
