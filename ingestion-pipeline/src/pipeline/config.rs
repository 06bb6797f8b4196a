#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Backoff applied by the scheduler between ticks after a transient
    /// graph-ingestion failure, before it tries the next batch.
    pub retry_base_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub retry_backoff_cap_exponent: u32,
    /// Retries for a single `graph_edge`/`graph_node` write that hits a
    /// transient SurrealDB commit conflict.
    pub graph_store_attempts: usize,
    pub graph_initial_backoff_ms: u64,
    pub graph_max_backoff_ms: u64,
    /// Token bounds used when chunking word-photo/crystal/tech-doc/inventory
    /// content before embedding (`documents` module).
    pub chunk_min_tokens: usize,
    pub chunk_max_tokens: usize,
    pub chunk_insert_concurrency: usize,
    /// Max concurrent embedding calls while converting LLM extraction output
    /// into `GraphNode`/`GraphEdge` rows.
    pub entity_embedding_concurrency: usize,
    /// How many existing graph nodes to sample for a group before running
    /// extraction, so the model can reuse known entity names.
    pub existing_entity_sample: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            retry_base_delay_secs: 30,
            retry_max_delay_secs: 15 * 60,
            retry_backoff_cap_exponent: 5,
            graph_store_attempts: 3,
            graph_initial_backoff_ms: 50,
            graph_max_backoff_ms: 800,
            chunk_min_tokens: 500,
            chunk_max_tokens: 2_000,
            chunk_insert_concurrency: 8,
            entity_embedding_concurrency: 4,
            existing_entity_sample: 20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}
