use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use ingestion_pipeline::IngestionPipeline;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub openai_client: Arc<Client<OpenAIConfig>>,
    pub ingestion_pipeline: Arc<IngestionPipeline>,
}

impl ApiState {
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        db.ensure_initialized().await?;

        let openai_client = Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(&config.openai_api_key)
                .with_api_base(&config.openai_base_url),
        ));

        let ingestion_pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&db),
            Arc::clone(&openai_client),
        ));

        Ok(Self {
            db,
            config: config.clone(),
            openai_client,
            ingestion_pipeline,
        })
    }
}
