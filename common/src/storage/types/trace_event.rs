use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

stored_object!(TraceEvent, "trace_event", {
    session_id: String,
    daemon_type: String,
    event_type: String,
    #[serde(default)]
    event_data: serde_json::Value,
    #[serde(default)]
    duration_ms: Option<u64>
});

impl TraceEvent {
    pub fn new(
        session_id: String,
        daemon_type: String,
        event_type: String,
        event_data: serde_json::Value,
        duration_ms: Option<u64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            session_id,
            daemon_type,
            event_type,
            event_data,
            duration_ms,
        }
    }

    /// Append-only write, called synchronously by every RPC handler before
    /// it returns. Never read back on the hot path; failures here are logged
    /// but must not fail the RPC call itself.
    pub async fn record(
        session_id: &str,
        daemon_type: &str,
        event_type: &str,
        event_data: serde_json::Value,
        duration_ms: Option<u64>,
        db: &SurrealDbClient,
    ) -> Result<Self, AppError> {
        let event = Self::new(
            session_id.to_owned(),
            daemon_type.to_owned(),
            event_type.to_owned(),
            event_data,
            duration_ms,
        );
        db.store_item(event.clone()).await?;
        Ok(event)
    }

    pub async fn recent_for_session(
        db: &SurrealDbClient,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Self>, AppError> {
        Ok(db
            .client
            .query(
                "SELECT * FROM type::table($table)
                 WHERE session_id = $session_id
                 ORDER BY created_at DESC
                 LIMIT $limit;",
            )
            .bind(("table", Self::table_name()))
            .bind(("session_id", session_id.to_owned()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }
}
