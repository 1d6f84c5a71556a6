//! The request orchestrator endpoint (component C10, spec §4.10): auth,
//! ACL-filter the requested collections, retrieve passages, and synthesize
//! an answer from them through the LLM router.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use identity::Permission;
use llm_router::{ChatRequest, Message};
use rag_service::retriever::{RetrievedPassage, SourceFilter};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/process_query", post(process_query))
}

#[derive(Deserialize)]
struct ProcessQueryRequest {
    query: String,
    collections: Vec<String>,
    llm_name: Option<String>,
    llm_model: Option<String>,
    #[serde(default)]
    select_sources: Vec<SelectedSource>,
    #[serde(default)]
    score_threshold: Option<f32>,
    system_message: Option<String>,
}

#[derive(Deserialize)]
struct SelectedSource {
    collection: String,
    source: String,
}

/// Builds the `docs` field of a query/search response: one entry per
/// retrieved passage, shaped for the client's citation list.
pub(crate) fn docs_json_from(passages: &[RetrievedPassage]) -> serde_json::Value {
    serde_json::json!(passages
        .iter()
        .map(|p| serde_json::json!({
            "content": p.content,
            "source": p.source,
            "page": p.page,
            "collection": p.collection,
            "score": p.score,
        }))
        .collect::<Vec<_>>())
}

async fn process_query(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<ProcessQueryRequest>) -> Result<Json<serde_json::Value>, AppError> {
    let acl = ctx.acl();
    let repo = ctx.repo();

    // ACL-filter the requested collections before C5 ever sees them
    // (spec §4.10 step 3 delegates enforcement to C8).
    let mut allowed_collections = Vec::new();
    for name in &req.collections {
        let Some(id) = repo.collection_id_by_name(name)? else { continue };
        if matches!(acl.effective_permission(&user.user_id, id.0)?, Some(Permission::Read) | Some(Permission::Write)) {
            allowed_collections.push(name.clone());
        }
    }
    if allowed_collections.is_empty() {
        return Err(AppError::Forbidden);
    }

    let source_filter: Vec<SourceFilter> =
        req.select_sources.into_iter().map(|s| SourceFilter { collection: s.collection, source: s.source }).collect();
    let threshold = req.score_threshold.unwrap_or(ctx.config().similarity);

    let passages = ctx.retriever().search(&allowed_collections, &req.query, &source_filter, threshold, ctx.config().doc_num)?;

    let system_message = match &req.system_message {
        Some(msg) => Some(msg.clone()),
        None => ctx.system_messages().selected_message(&user.user_id).ok().flatten(),
    };

    let context = passages.iter().map(|p| format!("[{} p{}] {}", p.source, p.page, p.content)).collect::<Vec<_>>().join("\n\n");
    let mut messages = Vec::new();
    messages.push(Message::system(system_message.unwrap_or_else(|| "Answer the question using only the provided context.".to_string())));
    messages.push(Message::user(format!("Context:\n{context}\n\nQuestion: {}", req.query)));

    let model = req.llm_model.clone().unwrap_or_else(|| ctx.config().default_llm_name.clone());
    let request = ChatRequest { model, messages, temperature: 0.2, max_tokens: 1024 };
    let response = ctx.router().chat(req.llm_name.as_deref(), request).await?;

    Ok(Json(serde_json::json!({
        "result": response.text,
        "metadata": { "model": response.model, "tokens_used": response.tokens_used },
        "docs": docs_json_from(&passages),
    })))
}
