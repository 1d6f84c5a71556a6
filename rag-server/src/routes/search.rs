//! Ad-hoc document browsing endpoint (component C5, spec §6). Unlike
//! `process_query`, this endpoint has no free-text query field in its
//! contract: `source_search` narrows which sources are considered, it is
//! not a semantic query (see `ChunkRepo::sources`'s `prefix?` parameter).

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use rag_service::retriever::RetrievedPassage;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::routes::query::docs_json_from;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/search-documents", get(search_documents))
}

#[derive(Deserialize)]
struct SearchQuery {
    collection_name: String,
    source_search: Option<String>,
    limit: Option<usize>,
}

async fn search_documents(
    State(ctx): State<AppState>,
    user: AuthUser,
    Query(q): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let acl = ctx.acl();
    let repo = ctx.repo();
    let collection_id = repo
        .collection_id_by_name(&q.collection_name)?
        .ok_or_else(|| AppError::NotFound(format!("collection not found: {}", q.collection_name)))?;
    if acl.effective_permission(&user.user_id, collection_id.0)?.is_none() {
        return Err(AppError::Forbidden);
    }

    let top_k = q.limit.unwrap_or(ctx.config().doc_num);
    let matched_sources = repo.sources(collection_id, q.source_search.as_deref())?;
    let chunks = repo.chunks_for_sources(collection_id, &matched_sources)?;

    let passages: Vec<RetrievedPassage> = chunks
        .into_iter()
        .take(top_k)
        .map(|c| RetrievedPassage {
            content: c.content,
            source: c.metadata.source,
            page: c.metadata.page,
            collection: q.collection_name.clone(),
            score: 1.0,
        })
        .collect();
    Ok(Json(docs_json_from(&passages)))
}
