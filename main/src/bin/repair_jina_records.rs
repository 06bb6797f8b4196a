//! Operator entry point for re-embedding `vector_document` chunks and graph
//! facts after an embedding-provider swap, so existing rows' vectors stay
//! compatible with the currently configured model/dimension. Name carried
//! over from the original embedding-provider swap scripts this is grounded
//! on; the provider itself is `openai_api_key`/`openai_base_url`, not
//! necessarily Jina.

use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use clap::Parser;
use common::{
    storage::{
        db::SurrealDbClient,
        types::{graph_edge::GraphEdge, vector_document::VectorDocument},
    },
    utils::{
        config::get_config,
        embedding::{generate_embedding_with_params, DEFAULT_EMBEDDING_MODEL},
    },
};
use retrieval_pipeline::documents::{CRYSTAL_COLLECTION, TECH_RAG_COLLECTION, WORD_PHOTO_COLLECTION};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LIST_LIMIT: usize = 100_000;

#[derive(Parser, Debug)]
#[command(author, version, about = "Re-embed vector_document chunks and graph facts under the current embedding provider")]
struct Args {
    /// Report how many rows would be re-embedded without writing anything.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();
    let config = get_config()?;

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

    let openai_client = Client::with_config(
        OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    );

    let mut repaired = 0usize;

    for category in [CRYSTAL_COLLECTION, WORD_PHOTO_COLLECTION, TECH_RAG_COLLECTION] {
        let documents = VectorDocument::list_by_category(&db, category, LIST_LIMIT).await?;
        for document in documents {
            if !args.dry_run {
                let embedding = generate_embedding_with_params(
                    &openai_client,
                    &document.content,
                    DEFAULT_EMBEDDING_MODEL,
                    common::storage::db::EMBEDDING_DIMENSION as u32,
                )
                .await?;
                VectorDocument::update_embedding(&db, &document.id, embedding).await?;
            }
            repaired += 1;
        }
    }

    let edges = GraphEdge::all_for_group(&db, &config.entity_name).await?;
    for edge in edges {
        if !args.dry_run {
            let embedding = generate_embedding_with_params(
                &openai_client,
                &edge.fact_text,
                DEFAULT_EMBEDDING_MODEL,
                common::storage::db::EMBEDDING_DIMENSION as u32,
            )
            .await?;
            GraphEdge::update_embedding(&db, &edge.id, embedding).await?;
        }
        repaired += 1;
    }

    if args.dry_run {
        info!(rows = repaired, "dry run: would re-embed these rows");
    } else {
        info!(rows = repaired, "re-embedded rows under the current provider");
    }

    Ok(())
}
