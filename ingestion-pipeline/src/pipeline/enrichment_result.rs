use std::collections::HashMap;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{graph_edge::GraphEdge, graph_node::GraphNode},
    },
    utils::embedding::generate_embedding,
};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

/// One entity mention the model found in the episode, keyed by a short local
/// id so facts in the same response can refer back to it without depending
/// on a database id that doesn't exist yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMGraphEntity {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub summary: String,
}

/// One fact the model found, relating two entity mentions by `key`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMGraphEdge {
    pub subject_key: String,
    pub object_key: String,
    pub predicate: String,
    pub fact_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LLMEnrichmentResult {
    #[serde(default)]
    pub entities: Vec<LLMGraphEntity>,
    #[serde(default)]
    pub edges: Vec<LLMGraphEdge>,
}

impl LLMEnrichmentResult {
    /// Resolves each entity mention to a `GraphNode` (reusing an existing
    /// node for the group when the name already exists) and builds embedded
    /// `GraphEdge`s for every fact whose endpoints both resolved.
    ///
    /// An edge naming an unknown key is dropped rather than failing the
    /// whole conversion: `spec.md` §7 treats a malformed item as something
    /// to skip, not something that fails the batch.
    pub async fn to_database_entities(
        &self,
        group_id: &str,
        openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
        db: &SurrealDbClient,
        entity_concurrency: usize,
    ) -> Result<(Vec<GraphNode>, Vec<GraphEdge>), AppError> {
        let mut nodes_by_key: HashMap<String, GraphNode> =
            HashMap::with_capacity(self.entities.len());
        for entity in &self.entities {
            let node = GraphNode::find_or_create(
                group_id,
                &entity.name,
                entity.labels.clone(),
                &entity.summary,
                db,
            )
            .await?;
            nodes_by_key.insert(entity.key.clone(), node);
        }

        let resolvable: Vec<&LLMGraphEdge> = self
            .edges
            .iter()
            .filter(|edge| {
                nodes_by_key.contains_key(&edge.subject_key)
                    && nodes_by_key.contains_key(&edge.object_key)
            })
            .collect();

        let dropped = self.edges.len() - resolvable.len();
        if dropped > 0 {
            tracing::warn!(
                dropped,
                "dropped graph edges referencing unresolved entity keys"
            );
        }

        let group_id = group_id.to_owned();
        let edges: Vec<GraphEdge> = stream::iter(resolvable.into_iter().map(|edge| {
            let subject = nodes_by_key[&edge.subject_key].clone();
            let object = nodes_by_key[&edge.object_key].clone();
            let group_id = group_id.clone();
            async move {
                let embedding = generate_embedding(openai_client, &edge.fact_text).await?;
                Ok::<GraphEdge, AppError>(GraphEdge::new(
                    group_id,
                    subject.name,
                    object.name,
                    edge.predicate.clone(),
                    edge.fact_text.clone(),
                    Some(chrono::Utc::now()),
                    subject.labels,
                    object.labels,
                    embedding,
                ))
            }
        }))
        .buffer_unordered(entity_concurrency.max(1))
        .try_collect()
        .await?;

        Ok((nodes_by_key.into_values().collect(), edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_with_no_entities_or_edges_deserializes() {
        let parsed: LLMEnrichmentResult = serde_json::from_str(r#"{"entities":[],"edges":[]}"#)
            .expect("deserialize empty result");
        assert!(parsed.entities.is_empty());
        assert!(parsed.edges.is_empty());
    }
}
