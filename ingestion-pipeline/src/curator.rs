use std::collections::HashMap;

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{graph_edge::GraphEdge, graph_node::GraphNode},
    },
};
use tracing::info;

/// Names the curator always treats as vague, regardless of how they were
/// extracted (`spec.md` §4.6).
const BLOCKLIST: &[&str] = &[
    "the", "?", "...", "it", "this", "that", "he", "she", "they", "them",
];

/// Names the strictest auto-delete subset targets directly, rather than via
/// the general blocklist/length check.
const STRICT_DELETE_NAMES: &[&str] = &["?", "", "the", "..."];

const NEIGHBORHOOD_FETCH_LIMIT: usize = 100;

#[derive(Debug, Clone, serde::Serialize)]
pub struct VagueEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DuplicateEdgeGroup {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub fact: String,
    pub kept_id: String,
    pub duplicate_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CuratorReport {
    pub vague_entities: Vec<VagueEntity>,
    pub duplicate_edges: Vec<DuplicateEdgeGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    ReportOnly,
    AutoDelete,
}

fn is_vague(name: &str) -> bool {
    let trimmed = name.trim();
    if trimmed.chars().count() < 2 {
        return true;
    }
    BLOCKLIST.contains(&trimmed.to_lowercase().as_str())
}

fn is_strict_delete_candidate(name: &str) -> bool {
    STRICT_DELETE_NAMES.contains(&name.trim().to_lowercase().as_str())
}

/// Samples the neighborhood of each seed entity, then reports (and, in
/// `Mode::AutoDelete`, deletes the strictest subset of) vague entities and
/// duplicate edges.
pub async fn run(
    db: &SurrealDbClient,
    group_id: &str,
    seed_entity_names: &[String],
    mode: Mode,
) -> Result<CuratorReport, AppError> {
    let mut edges_by_id: HashMap<String, GraphEdge> = HashMap::new();
    let mut names_seen: std::collections::HashSet<String> = std::collections::HashSet::new();

    for seed in seed_entity_names {
        let touching = GraphEdge::facts_touching(db, group_id, seed, NEIGHBORHOOD_FETCH_LIMIT).await?;
        for edge in touching {
            names_seen.insert(edge.subject_name.clone());
            names_seen.insert(edge.object_name.clone());
            edges_by_id.insert(edge.id.clone(), edge);
        }
    }

    let mut vague_entities = Vec::new();
    for name in &names_seen {
        if !is_vague(name) {
            continue;
        }
        for node in GraphNode::search_by_name(db, group_id, name, 5).await? {
            if node.name.eq_ignore_ascii_case(name) {
                vague_entities.push(VagueEntity {
                    id: node.id,
                    name: node.name,
                });
            }
        }
    }

    let mut groups: HashMap<(String, String, String, String), Vec<GraphEdge>> = HashMap::new();
    for edge in edges_by_id.into_values() {
        groups
            .entry((
                edge.subject_name.clone(),
                edge.predicate.clone(),
                edge.object_name.clone(),
                edge.fact_text.clone(),
            ))
            .or_default()
            .push(edge);
    }

    let mut duplicate_edges = Vec::new();
    for ((subject, predicate, object, fact), mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let kept = group.remove(0);
        duplicate_edges.push(DuplicateEdgeGroup {
            subject,
            predicate,
            object,
            fact,
            kept_id: kept.id,
            duplicate_ids: group.into_iter().map(|e| e.id).collect(),
        });
    }

    if mode == Mode::AutoDelete {
        for entity in &vague_entities {
            if is_strict_delete_candidate(&entity.name) {
                GraphNode::delete_by_id(&entity.id, db).await?;
                info!(entity = %entity.name, "curator deleted vague entity");
            }
        }
        for group in &duplicate_edges {
            for duplicate_id in &group.duplicate_ids {
                GraphEdge::delete_by_id(duplicate_id, db).await?;
                info!(edge = %duplicate_id, "curator deleted duplicate edge");
            }
        }
    }

    Ok(CuratorReport {
        vague_entities,
        duplicate_edges,
    })
}
