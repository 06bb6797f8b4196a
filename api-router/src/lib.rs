use api_state::ApiState;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use routes::{
    liveness::live,
    readiness::ready,
    rpc::{
        agent_context, ambient_recall, delete_edge, friction_search, get_crystals, get_turns_since,
        get_turns_since_summary, graphiti_ingestion_stats, ingest_batch_to_graphiti, pps_health, store_message,
        store_summary, summarize_messages, texture_search,
    },
};

pub mod api_state;
pub mod auth;
pub mod error;
pub mod routes;

/// Router for the RPC/tool surface, version 1 (`spec.md` §4.8). `/ready`
/// and `/live` stay unauthenticated for k8s/systemd probes; every other
/// route takes its token as a body field and checks it itself, via
/// `auth::check_token`, as the first thing its handler does (the request
/// body carries `token` alongside its arguments, so a body-consuming
/// `axum` middleware layer can't check it ahead of the handler).
pub fn api_routes_v1<S>(_app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live))
        .route("/ambient_recall", post(ambient_recall))
        .route("/store_message", post(store_message))
        .route("/summarize_messages", post(summarize_messages))
        .route("/store_summary", post(store_summary))
        .route("/get_crystals", post(get_crystals))
        .route("/get_turns_since", post(get_turns_since))
        .route("/get_turns_since_summary", post(get_turns_since_summary))
        .route("/graphiti_ingestion_stats", post(graphiti_ingestion_stats))
        .route("/ingest_batch_to_graphiti", post(ingest_batch_to_graphiti))
        .route("/delete_edge", post(delete_edge))
        .route("/texture_search", post(texture_search))
        .route("/agent_context", post(agent_context))
        .route("/friction_search", post(friction_search))
        .route("/pps_health", post(pps_health))
}
