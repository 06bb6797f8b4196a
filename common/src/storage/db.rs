use crate::error::AppError;
use crate::storage::indexes;

use super::types::StoredObject;
use futures::Stream;
use std::{ops::Deref, sync::Arc};
use surrealdb::{
    engine::any::{connect, Any},
    opt::auth::Root,
    Error, Notification, Surreal,
};

/// Embedding dimension used for every HNSW index this process maintains.
///
/// Fixed at 1536 (OpenAI `text-embedding-3-small`) for the lifetime of an
/// entity's store; changing embedding providers requires `repair_jina_records`
/// to re-embed and rebuild the index rather than mixing dimensions in place.
pub const EMBEDDING_DIMENSION: usize = 1536;

#[derive(Clone)]
pub struct SurrealDbClient {
    pub client: Surreal<Any>,
}

pub trait ProvidesDb {
    fn db(&self) -> &Arc<SurrealDbClient>;
}

impl SurrealDbClient {
    /// Initialize a new database client, signed in and scoped to a namespace/database.
    pub async fn new(
        address: &str,
        username: &str,
        password: &str,
        namespace: &str,
        database: &str,
    ) -> Result<Self, Error> {
        let db = connect(address).await?;

        db.signin(Root { username, password }).await?;
        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }

    /// Build the indexes this entity's store needs and bring it to a ready state.
    ///
    /// Idempotent: safe to call on every process start.
    pub async fn ensure_initialized(&self) -> Result<(), AppError> {
        self.build_indexes().await?;
        indexes::ensure_runtime_indexes(self, EMBEDDING_DIMENSION).await?;

        Ok(())
    }

    /// Define the baseline, non-runtime-tunable indexes: scheduler lookups and
    /// the trace-event append log. HNSW/FTS indexes are handled separately by
    /// `indexes::ensure_runtime_indexes`, since those depend on the embedding
    /// dimension in use.
    pub async fn build_indexes(&self) -> Result<(), Error> {
        self.client
            .query(
                "DEFINE INDEX IF NOT EXISTS idx_turn_summary_id ON turn FIELDS summary_id;
                 DEFINE INDEX IF NOT EXISTS idx_turn_batch_id ON turn FIELDS graphiti_batch_id;
                 DEFINE INDEX IF NOT EXISTS idx_turn_created_at ON turn FIELDS created_at;
                 DEFINE INDEX IF NOT EXISTS idx_graph_batch_status ON graph_batch FIELDS status;
                 DEFINE INDEX IF NOT EXISTS idx_trace_event_session ON trace_event FIELDS session_id;",
            )
            .await?;

        Ok(())
    }

    pub async fn rebuild_indexes(&self) -> Result<(), AppError> {
        indexes::rebuild_indexes(self).await
    }

    pub async fn drop_table<T>(&self) -> Result<Vec<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client.delete(T::table_name()).await
    }

    /// Operation to store an object in SurrealDB, requires the struct to implement StoredObject
    pub async fn store_item<T>(&self, item: T) -> Result<Option<T>, Error>
    where
        T: StoredObject + Send + Sync + 'static,
    {
        self.client
            .create((T::table_name(), item.get_id()))
            .content(item)
            .await
    }

    /// Operation to retrieve all objects from a certain table, requires the struct to implement StoredObject
    pub async fn get_all_stored_items<T>(&self) -> Result<Vec<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select(T::table_name()).await
    }

    /// Operation to retrieve a single object by its ID, requires the struct to implement StoredObject
    pub async fn get_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.select((T::table_name(), id)).await
    }

    /// Operation to delete a single object by its ID, requires the struct to implement StoredObject
    pub async fn delete_item<T>(&self, id: &str) -> Result<Option<T>, Error>
    where
        T: for<'de> StoredObject,
    {
        self.client.delete((T::table_name(), id)).await
    }

    /// Operation to listen to a table for updates, requires the struct to implement StoredObject
    pub async fn listen<T>(
        &self,
    ) -> Result<impl Stream<Item = Result<Notification<T>, Error>>, Error>
    where
        T: for<'de> StoredObject + std::marker::Unpin,
    {
        self.client.select(T::table_name()).live().await
    }
}

impl Deref for SurrealDbClient {
    type Target = Surreal<Any>;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl SurrealDbClient {
    /// Create an in-memory SurrealDB client for testing.
    pub async fn memory(namespace: &str, database: &str) -> Result<Self, Error> {
        let db = connect("mem://").await?;

        db.use_ns(namespace).use_db(database).await?;

        Ok(SurrealDbClient { client: db })
    }
}
