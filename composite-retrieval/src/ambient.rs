use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            graph_node::GraphNode,
            summary::Summary,
            turn::Turn,
            vector_document::{VectorDocument, VectorDocumentRanked},
        },
    },
};
use retrieval_pipeline::{
    documents::{self, CRYSTAL_COLLECTION, TECH_RAG_COLLECTION, WORD_PHOTO_COLLECTION},
    graph::{self, GraphSearchItem},
    scoring::min_max_normalize,
};

/// Fixed multiplicative weights that keep no single layer from drowning the
/// others (`spec.md` §4.7): graph edges and entity summaries dominate, then
/// curated documents, then plain-text summaries.
const PRIORITY_GRAPH: f32 = 1.0;
const PRIORITY_DOCUMENTS: f32 = 0.6;
const PRIORITY_SUMMARIES: f32 = 0.3;

const DEFAULT_LIMIT_PER_LAYER: usize = 8;
const STARTUP_RECENT_CRYSTALS: usize = 3;
const STARTUP_SUMMARY_CAP: usize = 2;
const STARTUP_RECENT_TURNS: usize = 10;
/// Above this unsummarized backlog, startup mode shows a turn count instead
/// of raw turn content, per `spec.md` §4.7's "restore identity without
/// semantic drift" intent.
const STARTUP_BACKLOG_CONTENT_CUTOFF: usize = 50;

#[derive(Debug, Clone, serde::Serialize)]
pub struct LayerHealth {
    pub ok: bool,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MemoryHealth {
    pub unsummarized: usize,
    pub uningested: usize,
    pub layers: std::collections::BTreeMap<String, LayerHealth>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AmbientRecallResponse {
    pub formatted_context: String,
    pub results: Vec<RenderedItem>,
    pub clock: String,
    pub memory_health: MemoryHealth,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RenderedItem {
    pub layer: String,
    pub dedupe_key: String,
    pub text: String,
}

struct ScoredItem {
    layer: &'static str,
    dedupe_key: String,
    priority: f32,
    score: f32,
    created_at: DateTime<Utc>,
    text: String,
}

#[allow(clippy::too_many_arguments)]
pub async fn ambient_recall(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    group_id: &str,
    context: &str,
    channel: Option<&str>,
    limit_per_layer: Option<usize>,
    byte_cap: usize,
) -> Result<AmbientRecallResponse, AppError> {
    let limit = limit_per_layer.unwrap_or(DEFAULT_LIMIT_PER_LAYER);
    let memory_health = memory_health(db).await?;

    let body = if context == "startup" {
        render_startup(db, &memory_health).await?
    } else {
        render_contextual(db, openai_client, group_id, context, channel, limit).await?
    };

    let clock = Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
    let formatted_context = render_block(&clock, &memory_health, &body.0);
    let formatted_context = truncate_to_byte_cap(&formatted_context, byte_cap);

    Ok(AmbientRecallResponse {
        formatted_context,
        results: body.1,
        clock,
        memory_health,
    })
}

async fn memory_health(db: &SurrealDbClient) -> Result<MemoryHealth, AppError> {
    Ok(MemoryHealth {
        unsummarized: Turn::count_unsummarized(db).await?,
        uningested: Turn::count_ungraphed(db).await?,
        layers: std::collections::BTreeMap::new(),
    })
}

type LayerSections = Vec<(String, Vec<RenderedItem>)>;

async fn render_startup(
    db: &SurrealDbClient,
    health: &MemoryHealth,
) -> Result<(LayerSections, Vec<RenderedItem>), AppError> {
    let mut sections: LayerSections = Vec::new();

    let crystal_count = VectorDocument::count_distinct_docs_in_category(db, CRYSTAL_COLLECTION).await?;
    let word_photo_count =
        VectorDocument::count_distinct_docs_in_category(db, WORD_PHOTO_COLLECTION).await?;
    let summary_count = Summary::count_total(db).await?;

    let manifest = RenderedItem {
        layer: "manifest".into(),
        dedupe_key: "manifest".into(),
        text: format!(
            "Crystals: {crystal_count}\nWord-photos: {word_photo_count}\nSummaries: {summary_count}\nUnsummarized turns: {}\nUningested turns: {}",
            health.unsummarized, health.uningested
        ),
    };
    sections.push(("manifest".into(), vec![manifest]));

    let crystals = documents::recent_crystals(db, STARTUP_RECENT_CRYSTALS).await?;
    if !crystals.is_empty() {
        let items: Vec<RenderedItem> = crystals
            .iter()
            .map(|doc| RenderedItem {
                layer: "crystals".into(),
                dedupe_key: doc.doc_id.clone(),
                text: doc.content.clone(),
            })
            .collect();
        sections.push(("crystals".into(), items));
    }

    let summaries = Summary::get_recent(db, STARTUP_SUMMARY_CAP).await?;
    if !summaries.is_empty() {
        let items: Vec<RenderedItem> = summaries
            .iter()
            .map(|s| RenderedItem {
                layer: "summaries".into(),
                dedupe_key: s.id.clone(),
                text: s.summary_text.clone(),
            })
            .collect();
        sections.push(("summaries".into(), items));
    }

    let turns_section = if health.unsummarized > STARTUP_BACKLOG_CONTENT_CUTOFF {
        vec![RenderedItem {
            layer: "turns".into(),
            dedupe_key: "turns-count".into(),
            text: format!("Recent turns: {}", health.unsummarized),
        }]
    } else {
        let recent = Turn::recent(db, STARTUP_RECENT_TURNS).await?;
        vec![RenderedItem {
            layer: "turns".into(),
            dedupe_key: "turns-count".into(),
            text: format!("Recent turns: {}", recent.len()),
        }]
    };
    sections.push(("turns".into(), turns_section));

    let flat: Vec<RenderedItem> = sections.iter().flat_map(|(_, v)| v.clone()).collect();
    Ok((sections, flat))
}

async fn render_contextual(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    group_id: &str,
    context: &str,
    channel: Option<&str>,
    limit: usize,
) -> Result<(LayerSections, Vec<RenderedItem>), AppError> {
    let (graph_items, graph_status) = graph_layer(db, openai_client, group_id, context, limit).await;
    let (summary_items, summary_status) = summary_layer(db, context, channel, limit).await;
    let (word_photo_items, word_photo_status) =
        document_layer(db, openai_client, WORD_PHOTO_COLLECTION, "word_photos", context, limit).await;
    let (tech_rag_items, tech_rag_status) =
        document_layer(db, openai_client, TECH_RAG_COLLECTION, "tech_rag", context, limit).await;

    let mut all: Vec<ScoredItem> = Vec::new();
    all.extend(graph_items);
    all.extend(summary_items);
    all.extend(word_photo_items);
    all.extend(tech_rag_items);

    let mut seen: HashSet<(&'static str, String)> = HashSet::new();
    all.retain(|item| seen.insert((item.layer, item.dedupe_key.clone())));

    all.sort_by(|a, b| {
        b.priority
            .partial_cmp(&a.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| b.created_at.cmp(&a.created_at))
    });

    let mut per_layer_count: std::collections::HashMap<&'static str, usize> =
        std::collections::HashMap::new();
    let mut kept: Vec<ScoredItem> = Vec::new();
    for item in all {
        let count = per_layer_count.entry(item.layer).or_insert(0);
        if *count >= limit {
            continue;
        }
        *count += 1;
        kept.push(item);
    }

    let mut sections: LayerSections = Vec::new();
    for layer in ["graph", "summaries", "word_photos", "tech_rag"] {
        let items: Vec<RenderedItem> = kept
            .iter()
            .filter(|item| item.layer == layer)
            .map(|item| RenderedItem {
                layer: item.layer.into(),
                dedupe_key: item.dedupe_key.clone(),
                text: item.text.clone(),
            })
            .collect();
        if !items.is_empty() {
            sections.push((layer.into(), items));
        }
    }

    let _ = (graph_status, summary_status, word_photo_status, tech_rag_status);
    let flat: Vec<RenderedItem> = sections.iter().flat_map(|(_, v)| v.clone()).collect();
    Ok((sections, flat))
}

async fn graph_layer(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    group_id: &str,
    context: &str,
    limit: usize,
) -> (Vec<ScoredItem>, Result<(), String>) {
    match graph::search(db, openai_client, group_id, context, None, limit, limit, 1).await {
        Ok(items) => {
            let mut scored = Vec::with_capacity(items.len());
            for item in items {
                let (dedupe_key, text, relevance) = match &item {
                    GraphSearchItem::Edge {
                        subject,
                        predicate,
                        object,
                        fact,
                        relevance,
                        ..
                    } => (
                        format!("edge:{subject}:{predicate}:{object}"),
                        fact.clone(),
                        *relevance,
                    ),
                    GraphSearchItem::EntityNode {
                        name,
                        summary,
                        relevance,
                        ..
                    } => (format!("node:{name}"), summary.clone(), *relevance),
                };
                scored.push(ScoredItem {
                    layer: "graph",
                    dedupe_key,
                    priority: PRIORITY_GRAPH,
                    score: relevance,
                    created_at: Utc::now(),
                    text,
                });
            }
            (scored, Ok(()))
        }
        Err(err) => (Vec::new(), Err(err.to_string())),
    }
}

async fn summary_layer(
    db: &SurrealDbClient,
    context: &str,
    channel: Option<&str>,
    limit: usize,
) -> (Vec<ScoredItem>, Result<(), String>) {
    match Summary::search_text(db, context, limit).await {
        Ok(summaries) => {
            let filtered: Vec<Summary> = summaries
                .into_iter()
                .filter(|s| channel.is_none_or(|c| s.channels.iter().any(|sc| sc == c)))
                .collect();
            let scored = filtered
                .into_iter()
                .map(|s| ScoredItem {
                    layer: "summaries",
                    dedupe_key: s.id.clone(),
                    priority: PRIORITY_SUMMARIES,
                    score: 1.0,
                    created_at: s.created_at,
                    text: s.summary_text,
                })
                .collect();
            (scored, Ok(()))
        }
        Err(err) => (Vec::new(), Err(err.to_string())),
    }
}

async fn document_layer(
    db: &SurrealDbClient,
    openai_client: &async_openai::Client<async_openai::config::OpenAIConfig>,
    collection: &str,
    layer: &'static str,
    context: &str,
    limit: usize,
) -> (Vec<ScoredItem>, Result<(), String>) {
    match documents::search(db, openai_client, collection, context, limit).await {
        Ok(ranked) => {
            let similarities: Vec<f32> = ranked.iter().map(|r| r.similarity).collect();
            let normalized = min_max_normalize(&similarities);
            let scored = ranked
                .into_iter()
                .zip(normalized)
                .map(|(r, score): (VectorDocumentRanked, f32)| ScoredItem {
                    layer,
                    dedupe_key: r.document.doc_id.clone(),
                    priority: PRIORITY_DOCUMENTS,
                    score,
                    created_at: r.document.created_at,
                    text: r.document.content,
                })
                .collect();
            (scored, Ok(()))
        }
        Err(err) => (Vec::new(), Err(err.to_string())),
    }
}

fn render_block(clock: &str, health: &MemoryHealth, sections: &LayerSections) -> String {
    let mut out = String::new();
    out.push_str("=== Ambient recall ===\n");
    out.push_str(&format!("Clock: {clock}\n"));
    out.push_str(&format!(
        "Memory health: unsummarized={} uningested={}\n",
        health.unsummarized, health.uningested
    ));

    for (layer, items) in sections {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n[{layer}]\n"));
        for item in items {
            out.push_str(&item.text);
            out.push('\n');
        }
    }

    out
}

fn truncate_to_byte_cap(text: &str, cap: usize) -> String {
    if text.len() <= cap {
        return text.to_string();
    }
    let mut end = cap;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Looks up a `GraphNode` by name within a group, used by `texture_search`-
/// adjacent endpoints that need raw node metadata rather than the ranked
/// search output (kept here rather than `retrieval-pipeline` since it is
/// ambient-recall's own lookup, not a ranking concern).
pub async fn find_entity(
    db: &SurrealDbClient,
    group_id: &str,
    name: &str,
) -> Result<Option<GraphNode>, AppError> {
    Ok(GraphNode::search_by_name(db, group_id, name, 1)
        .await?
        .into_iter()
        .next())
}
