//! Document ingestion and browsing endpoints (components C4/C5, spec §6).

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use identity::Permission;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/upload_and_embed", post(upload_and_embed))
        .route("/api/check_file_exists", post(check_file_exists))
        .route("/api/delete-sources", post(delete_sources))
        .route("/api/get-all-documents-source", get(all_sources))
        .route("/api/view-collection", get(view_collection))
        .route("/api/get-document-pages", get(document_pages))
        .route("/api/page-content", post(page_content))
}

fn require_write(ctx: &rag_service::AppContext, user_id: &str, collection_id: chunk_model::CollectionId) -> Result<(), AppError> {
    match ctx.acl().effective_permission(user_id, collection_id.0)? {
        Some(Permission::Write) => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

fn require_delete(ctx: &rag_service::AppContext, user_id: &str, collection_id: chunk_model::CollectionId) -> Result<(), AppError> {
    if ctx.acl().can_delete(user_id, collection_id.0)? {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn resolve_collection(ctx: &rag_service::AppContext, name: &str) -> Result<chunk_model::CollectionId, AppError> {
    ctx.repo().collection_id_by_name(name)?.ok_or_else(|| AppError::NotFound(format!("collection not found: {name}")))
}

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    chunks_stored: usize,
    chunks_failed: usize,
}

async fn upload_and_embed(State(ctx): State<AppState>, user: AuthUser, mut multipart: Multipart) -> Result<Json<UploadResponse>, AppError> {
    let mut collection_name: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::Validation(e.to_string()))? {
        match field.name().unwrap_or_default() {
            "collection" => collection_name = Some(field.text().await.map_err(|e| AppError::Validation(e.to_string()))?),
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| AppError::Validation(e.to_string()))?;
                if data.len() as u64 > ctx.config().upload_max_bytes {
                    return Err(AppError::Validation(format!("file exceeds the {}-byte upload limit", ctx.config().upload_max_bytes)));
                }
                bytes = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let collection_name = collection_name.ok_or_else(|| AppError::Validation("missing 'collection' field".to_string()))?;
    let filename = filename.ok_or_else(|| AppError::Validation("missing uploaded file".to_string()))?;
    let bytes = bytes.ok_or_else(|| AppError::Validation("missing uploaded file".to_string()))?;

    let collection_id = resolve_collection(&ctx, &collection_name)?;
    require_write(&ctx, &user.user_id, collection_id)?;

    let dir = tempfile::tempdir().map_err(|e| AppError::Internal(e.to_string()))?;
    let path = dir.path().join(&filename);
    std::fs::write(&path, &bytes).map_err(|e| AppError::Internal(e.to_string()))?;

    let report = ctx.ingestor().ingest_file(&path, &filename, collection_id)?;
    if report.stored == 0 && report.failed == 0 {
        return Err(AppError::NoTextExtracted);
    }
    Ok(Json(UploadResponse { success: true, chunks_stored: report.stored, chunks_failed: report.failed }))
}

#[derive(Deserialize)]
struct CheckFileExistsRequest {
    collection: String,
    filename: String,
}

#[derive(Serialize)]
struct CheckFileExistsResponse {
    exists: bool,
}

async fn check_file_exists(State(ctx): State<AppState>, _user: AuthUser, Json(req): Json<CheckFileExistsRequest>) -> Result<Json<CheckFileExistsResponse>, AppError> {
    let collection_id = resolve_collection(&ctx, &req.collection)?;
    Ok(Json(CheckFileExistsResponse { exists: ctx.repo().source_exists(collection_id, &req.filename)? }))
}

#[derive(Deserialize)]
struct DeleteSourcesRequest {
    documents: Vec<DocumentRef>,
}

#[derive(Deserialize)]
struct DocumentRef {
    source: SourceRef,
}

#[derive(Deserialize)]
struct SourceRef {
    collection: String,
    source: String,
}

#[derive(Serialize)]
struct DeleteResults {
    successful: Vec<String>,
    failed: Vec<String>,
    success_rate: f32,
}

#[derive(Serialize)]
struct DeleteSourcesResponse {
    results: DeleteResults,
}

/// Best-effort batch delete: each entry is independent, so one failure
/// doesn't abort the rest (`207 Multi-Status`-style partial success, spec §6).
async fn delete_sources(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<DeleteSourcesRequest>) -> Result<(StatusCode, Json<DeleteSourcesResponse>), AppError> {
    let total = req.documents.len().max(1) as f32;
    let mut successful = Vec::new();
    let mut failed = Vec::new();

    for doc in req.documents {
        let label = format!("{}/{}", doc.source.collection, doc.source.source);
        let outcome = (|| -> Result<(), AppError> {
            let collection_id = resolve_collection(&ctx, &doc.source.collection)?;
            require_delete(&ctx, &user.user_id, collection_id)?;
            ctx.repo().delete_by_source(collection_id, &doc.source.source)?;
            Ok(())
        })();
        match outcome {
            Ok(()) => successful.push(label),
            Err(_) => failed.push(label),
        }
    }

    let status = if failed.is_empty() { StatusCode::OK } else { StatusCode::from_u16(207).unwrap() };
    let success_rate = successful.len() as f32 / total;
    Ok((status, Json(DeleteSourcesResponse { results: DeleteResults { successful, failed, success_rate } })))
}

#[derive(Deserialize)]
struct CollectionQuery {
    collection: String,
}

async fn all_sources(State(ctx): State<AppState>, _user: AuthUser, Query(q): Query<CollectionQuery>) -> Result<Json<Vec<String>>, AppError> {
    let collection_id = resolve_collection(&ctx, &q.collection)?;
    Ok(Json(ctx.repo().sources(collection_id, None)?))
}

#[derive(Serialize)]
struct ViewCollectionEntry {
    source: String,
    pages: Vec<u32>,
}

async fn view_collection(State(ctx): State<AppState>, _user: AuthUser, Query(q): Query<CollectionQuery>) -> Result<Json<Vec<ViewCollectionEntry>>, AppError> {
    let collection_id = resolve_collection(&ctx, &q.collection)?;
    let repo = ctx.repo();
    let mut entries = Vec::new();
    for source in repo.sources(collection_id, None)? {
        let pages = repo.pages(collection_id, &source)?;
        entries.push(ViewCollectionEntry { source, pages });
    }
    Ok(Json(entries))
}

#[derive(Deserialize)]
struct DocumentPagesQuery {
    collection_id: i64,
    source: String,
}

async fn document_pages(State(ctx): State<AppState>, _user: AuthUser, Query(q): Query<DocumentPagesQuery>) -> Result<Json<Vec<u32>>, AppError> {
    let collection_id = chunk_model::CollectionId(q.collection_id);
    Ok(Json(ctx.repo().pages(collection_id, &q.source)?))
}

#[derive(Deserialize)]
struct PageContentRequest {
    collection_id: i64,
    source: String,
    page_num: u32,
}

#[derive(Serialize)]
struct PageContentResponse {
    content: String,
}

async fn page_content(State(ctx): State<AppState>, _user: AuthUser, Json(req): Json<PageContentRequest>) -> Result<Json<PageContentResponse>, AppError> {
    let collection_id = chunk_model::CollectionId(req.collection_id);
    let chunks = ctx.repo().get_chunk_by_page(collection_id, &req.source, req.page_num)?;
    let content = chunks.into_iter().map(|c| c.content).collect::<Vec<_>>().join("\n\n");
    Ok(Json(PageContentResponse { content }))
}
