use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Default, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

/// Process-wide configuration for a single active entity.
///
/// One process serves one entity (see `spec.md` §1/§3); multi-entity
/// deployments run one process per entity, each with its own `ENTITY_NAME`
/// / `ENTITY_PATH` and config file.
#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub entity_name: String,
    #[serde(default = "default_entity_path")]
    pub entity_path: String,
    pub entity_token: String,

    pub openai_api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Scheduler tunables, `spec.md` §4.5.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub ingest_max_content_bytes: usize,
    #[serde(default)]
    pub ingest_max_context_bytes: usize,
    #[serde(default)]
    pub ingest_max_category_bytes: usize,
    #[serde(default)]
    pub ingest_max_files: usize,

    /// Global output cap for a rendered `ambient_recall` response, in bytes.
    #[serde(default = "default_recall_byte_cap")]
    pub recall_byte_cap: usize,
}

#[derive(Clone, Deserialize, Debug)]
pub struct SchedulerConfig {
    /// `T_s`: unsummarized backlog threshold that triggers a summarization tick.
    #[serde(default = "default_summarize_threshold")]
    pub summarize_threshold: usize,
    /// `B_s`: number of turns claimed per summarization tick.
    #[serde(default = "default_summarize_batch")]
    pub summarize_batch: usize,
    /// `T_g`: uningested-to-graph backlog threshold that triggers a graph tick.
    #[serde(default = "default_graph_threshold")]
    pub graph_threshold: usize,
    /// `B_g`: number of turns claimed per graph-ingestion tick.
    #[serde(default = "default_graph_batch")]
    pub graph_batch: usize,
    /// Max concurrent graph-ingestion episodes in flight per tick.
    #[serde(default = "default_graph_concurrency")]
    pub graph_concurrency: usize,
    /// Minimum sleep enforced between graph-ingestion ticks.
    #[serde(default = "default_inter_batch_sleep_secs")]
    pub inter_batch_sleep_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            summarize_threshold: default_summarize_threshold(),
            summarize_batch: default_summarize_batch(),
            graph_threshold: default_graph_threshold(),
            graph_batch: default_graph_batch(),
            graph_concurrency: default_graph_concurrency(),
            inter_batch_sleep_secs: default_inter_batch_sleep_secs(),
        }
    }
}

fn default_summarize_threshold() -> usize {
    100
}
fn default_summarize_batch() -> usize {
    50
}
fn default_graph_threshold() -> usize {
    100
}
fn default_graph_batch() -> usize {
    10
}
fn default_graph_concurrency() -> usize {
    1
}
fn default_inter_batch_sleep_secs() -> u64 {
    5
}
fn default_entity_path() -> String {
    "./data/entities/default".to_string()
}
fn default_data_dir() -> String {
    "./data".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_http_port() -> u16 {
    8201
}
fn default_recall_byte_cap() -> usize {
    16_384
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            entity_name: String::new(),
            entity_path: default_entity_path(),
            entity_token: String::new(),
            openai_api_key: String::new(),
            openai_base_url: default_openai_base_url(),
            surrealdb_address: String::new(),
            surrealdb_username: String::new(),
            surrealdb_password: String::new(),
            surrealdb_namespace: String::new(),
            surrealdb_database: String::new(),
            data_dir: default_data_dir(),
            storage: default_storage_kind(),
            http_port: default_http_port(),
            scheduler: SchedulerConfig::default(),
            ingest_max_content_bytes: 0,
            ingest_max_context_bytes: 0,
            ingest_max_category_bytes: 0,
            ingest_max_files: 0,
            recall_byte_cap: default_recall_byte_cap(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(any(test, feature = "test-utils"))]
pub fn test_config() -> AppConfig {
    AppConfig {
        entity_name: "test-entity".into(),
        entity_path: "/tmp/pps-test-entity".into(),
        entity_token: "test-token".into(),
        openai_api_key: "test".into(),
        openai_base_url: default_openai_base_url(),
        surrealdb_address: "mem://".into(),
        surrealdb_username: "test".into(),
        surrealdb_password: "test".into(),
        surrealdb_namespace: "test".into(),
        surrealdb_database: "test".into(),
        data_dir: "/tmp/pps-test-data".into(),
        storage: StorageKind::Memory,
        http_port: 0,
        scheduler: SchedulerConfig::default(),
        ingest_max_content_bytes: 1_000_000,
        ingest_max_context_bytes: 100_000,
        ingest_max_category_bytes: 256,
        ingest_max_files: 20,
        recall_byte_cap: default_recall_byte_cap(),
    }
}
