use std::cmp::Ordering;
use std::collections::HashMap;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{graph_edge::GraphEdge, graph_node::GraphNode, StoredObject},
    },
    utils::embedding::generate_embedding,
};

use crate::scoring::clamp_unit;

/// One item of a ranked graph search result (`spec.md` §4.3).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GraphSearchItem {
    Edge {
        subject: String,
        predicate: String,
        object: String,
        fact: String,
        source_labels: Vec<String>,
        target_labels: Vec<String>,
        relevance: f32,
    },
    EntityNode {
        name: String,
        labels: Vec<String>,
        summary: String,
        relevance: f32,
    },
}

#[derive(Debug, Clone)]
struct Ranked {
    item: GraphSearchItem,
    relevance: f32,
    created_at: chrono::DateTime<chrono::Utc>,
    uuid: String,
}

/// Weight given to semantic similarity in the entity-centric ranking convex
/// combination; the remainder goes to graph proximity to the center entity.
pub const SEMANTIC_WEIGHT: f32 = 0.65;

#[allow(clippy::too_many_arguments)]
pub async fn search(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    group_id: &str,
    query: &str,
    center_entity_name: Option<&str>,
    limit_edges: usize,
    limit_nodes: usize,
    explore_depth: usize,
) -> Result<Vec<GraphSearchItem>, AppError> {
    let query_embedding = generate_embedding(openai_client, query).await?;

    let semantic_edges =
        GraphEdge::vector_search(db, group_id, query_embedding, limit_edges).await?;

    let proximity_edges = match center_entity_name {
        Some(center) => explore(db, group_id, center, explore_depth).await?,
        None => Vec::new(),
    };

    let mut by_id: HashMap<String, Ranked> = HashMap::new();

    for ranked in semantic_edges {
        let similarity = clamp_unit(ranked.similarity);
        let weighted = SEMANTIC_WEIGHT * similarity;
        by_id
            .entry(ranked.edge.id.clone())
            .and_modify(|existing| existing.relevance = existing.relevance.max(weighted))
            .or_insert(Ranked {
                relevance: weighted,
                created_at: ranked.edge.created_at,
                uuid: ranked.edge.id.clone(),
                item: GraphSearchItem::Edge {
                    subject: ranked.edge.subject_name.clone(),
                    predicate: ranked.edge.predicate.clone(),
                    object: ranked.edge.object_name.clone(),
                    fact: ranked.edge.fact_text.clone(),
                    source_labels: ranked.edge.source_labels.clone(),
                    target_labels: ranked.edge.target_labels.clone(),
                    relevance: 0.0,
                },
            });
    }

    let proximity_span = proximity_edges.len().max(1) as f32;
    for (depth, edge) in proximity_edges {
        let proximity = clamp_unit(1.0 - (depth as f32 / proximity_span));
        let weighted = (1.0 - SEMANTIC_WEIGHT) * proximity;
        by_id
            .entry(edge.id.clone())
            .and_modify(|existing| existing.relevance += weighted)
            .or_insert(Ranked {
                relevance: weighted,
                created_at: edge.created_at,
                uuid: edge.id.clone(),
                item: GraphSearchItem::Edge {
                    subject: edge.subject_name.clone(),
                    predicate: edge.predicate.clone(),
                    object: edge.object_name.clone(),
                    fact: edge.fact_text.clone(),
                    source_labels: edge.source_labels.clone(),
                    target_labels: edge.target_labels.clone(),
                    relevance: 0.0,
                },
            });
    }

    for ranked in by_id.values_mut() {
        ranked.relevance = clamp_unit(ranked.relevance);
    }

    let nodes = GraphNode::search_by_name(db, group_id, query, limit_nodes).await?;
    let canonical_nodes = canonicalize(db, nodes).await?;
    for node in canonical_nodes {
        by_id.entry(format!("node:{}", node.id)).or_insert(Ranked {
            relevance: 0.5,
            created_at: node.created_at,
            uuid: node.id.clone(),
            item: GraphSearchItem::EntityNode {
                name: node.name,
                labels: node.labels,
                summary: node.summary,
                relevance: 0.5,
            },
        });
    }

    let mut ranked: Vec<Ranked> = by_id.into_values().collect();
    ranked.sort_by(|a, b| {
        b.relevance
            .partial_cmp(&a.relevance)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.uuid.cmp(&b.uuid))
    });

    Ok(ranked
        .into_iter()
        .map(|r| with_relevance(r.item, r.relevance))
        .collect())
}

fn with_relevance(item: GraphSearchItem, relevance: f32) -> GraphSearchItem {
    match item {
        GraphSearchItem::Edge {
            subject,
            predicate,
            object,
            fact,
            source_labels,
            target_labels,
            ..
        } => GraphSearchItem::Edge {
            subject,
            predicate,
            object,
            fact,
            source_labels,
            target_labels,
            relevance,
        },
        GraphSearchItem::EntityNode {
            name,
            labels,
            summary,
            ..
        } => GraphSearchItem::EntityNode {
            name,
            labels,
            summary,
            relevance,
        },
    }
}

/// Breadth-limited neighborhood of `entity_name`, restricted to `group_id`.
/// Returns `(depth, edge)` pairs, closest first, skipping edges already
/// visited at a shallower depth.
pub async fn explore(
    db: &SurrealDbClient,
    group_id: &str,
    entity_name: &str,
    depth: usize,
) -> Result<Vec<(usize, GraphEdge)>, AppError> {
    let mut visited_names = std::collections::HashSet::new();
    let mut visited_edges = std::collections::HashSet::new();
    let mut frontier = vec![entity_name.to_owned()];
    let mut out = Vec::new();

    visited_names.insert(entity_name.to_owned());

    for current_depth in 0..=depth {
        let mut next_frontier = Vec::new();
        for name in &frontier {
            let touching = GraphEdge::facts_touching(db, group_id, name, 50).await?;
            for edge in touching {
                if !visited_edges.insert(edge.id.clone()) {
                    continue;
                }
                let neighbor = if edge.subject_name == *name {
                    edge.object_name.clone()
                } else {
                    edge.subject_name.clone()
                };
                if visited_names.insert(neighbor.clone()) {
                    next_frontier.push(neighbor);
                }
                out.push((current_depth, edge));
            }
        }
        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    Ok(out)
}

/// Groups same-named nodes and keeps only the most-connected one per name,
/// per `spec.md` §4.3's canonical-duplicate rule.
async fn canonicalize(
    db: &SurrealDbClient,
    nodes: Vec<GraphNode>,
) -> Result<Vec<GraphNode>, AppError> {
    let mut by_name: HashMap<String, Vec<GraphNode>> = HashMap::new();
    for node in nodes {
        by_name.entry(node.name.clone()).or_default().push(node);
    }

    let mut canonical = Vec::with_capacity(by_name.len());
    for (_, candidates) in by_name {
        if candidates.len() == 1 {
            canonical.push(candidates.into_iter().next().expect("len == 1"));
            continue;
        }

        let mut best: Option<(usize, GraphNode)> = None;
        for node in candidates {
            let count = node.connection_count(db).await?;
            if best
                .as_ref()
                .is_none_or(|(best_count, _)| count > *best_count)
            {
                best = Some((count, node));
            }
        }
        if let Some((_, node)) = best {
            canonical.push(node);
        }
    }

    Ok(canonical)
}

pub async fn delete_edge(db: &SurrealDbClient, uuid: &str) -> Result<(), AppError> {
    GraphEdge::delete_by_id(uuid, db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn embedding(seed: f32) -> Vec<f32> {
        vec![seed, 1.0 - seed, 0.0]
    }

    #[tokio::test]
    async fn explore_expands_breadth_first_and_stops_at_depth() {
        let db = SurrealDbClient::memory("graph_explore_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        GraphEdge::new(
            "agent".into(),
            "alice".into(),
            "rust".into(),
            "LIKES".into(),
            "alice likes rust".into(),
            None,
            vec![],
            vec![],
            embedding(0.1),
        )
        .store(&db)
        .await
        .expect("store edge 1");

        GraphEdge::new(
            "agent".into(),
            "rust".into(),
            "memory-safety".into(),
            "HAS_PROPERTY".into(),
            "rust has memory safety".into(),
            None,
            vec![],
            vec![],
            embedding(0.2),
        )
        .store(&db)
        .await
        .expect("store edge 2");

        let depth0 = explore(&db, "agent", "alice", 0)
            .await
            .expect("explore depth 0");
        assert_eq!(depth0.len(), 1);

        let depth1 = explore(&db, "agent", "alice", 1)
            .await
            .expect("explore depth 1");
        assert_eq!(depth1.len(), 2);
    }

    #[tokio::test]
    async fn canonicalize_keeps_most_connected_duplicate() {
        let db = SurrealDbClient::memory("graph_canon_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        let popular = GraphNode::new("agent".into(), "Rust".into(), vec![], String::new());
        db.store_item(popular.clone())
            .await
            .expect("store popular node");
        let lonely = GraphNode::new("agent".into(), "Rust".into(), vec![], String::new());
        db.store_item(lonely.clone())
            .await
            .expect("store lonely node");

        GraphEdge::new(
            "agent".into(),
            "alice".into(),
            "Rust".into(),
            "LIKES".into(),
            "alice likes rust".into(),
            None,
            vec![],
            vec![],
            embedding(0.3),
        )
        .store(&db)
        .await
        .expect("store edge touching popular node's name");

        let canonical = canonicalize(&db, vec![popular.clone(), lonely.clone()])
            .await
            .expect("canonicalize");
        assert_eq!(canonical.len(), 1);
        assert_eq!(canonical[0].name, "Rust");
    }

    #[tokio::test]
    async fn search_populates_relevance_on_every_item() {
        let db = SurrealDbClient::memory("graph_search_ns", &Uuid::new_v4().to_string())
            .await
            .expect("in-memory db");

        GraphEdge::new(
            "agent".into(),
            "alice".into(),
            "rust".into(),
            "LIKES".into(),
            "alice likes rust".into(),
            None,
            vec![],
            vec![],
            embedding(0.1),
        )
        .store(&db)
        .await
        .expect("store edge");

        let openai_client = async_openai::Client::new();
        let items = search(&db, &openai_client, "agent", "rust", None, 10, 10, 1)
            .await
            .expect("search");

        for item in items {
            let relevance = match item {
                GraphSearchItem::Edge { relevance, .. } => relevance,
                GraphSearchItem::EntityNode { relevance, .. } => relevance,
            };
            assert!((0.0..=1.0).contains(&relevance));
        }
    }
}
