//! Collection management endpoints (spec §6, ACL-gated via component C8).

use axum::extract::{Query, State};
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
        .route("/api/create-collection", post(create_collection))
        .route("/api/list-collections", get(list_collections))
        .route("/api/collections", get(collections_for_user))
        .route("/api/delete-collection", post(delete_collection))
        .route("/api/collections/permissions", post(replace_permissions))
}

#[derive(Deserialize)]
struct CreateCollectionRequest {
    name: String,
}

#[derive(Serialize)]
struct CreateCollectionResponse {
    message: String,
}

async fn create_collection(
    State(ctx): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateCollectionRequest>,
) -> Result<(StatusCode, Json<CreateCollectionResponse>), AppError> {
    ctx.repo().create_collection(&req.name, &user.user_id)?;
    Ok((StatusCode::CREATED, Json(CreateCollectionResponse { message: format!("collection '{}' created", req.name) })))
}

#[derive(Serialize)]
struct CollectionSummary {
    id: i64,
    name: String,
    created_by: String,
}

async fn list_collections(State(ctx): State<AppState>, user: AuthUser) -> Result<Json<Vec<CollectionSummary>>, AppError> {
    user.require_admin(&ctx)?;
    let collections = ctx.repo().list_collections()?.into_iter().map(|(id, name, created_by)| CollectionSummary { id: id.0, name, created_by }).collect();
    Ok(Json(collections))
}

#[derive(Deserialize)]
struct CollectionsQuery {
    user_id: Option<String>,
}

#[derive(Serialize)]
struct UserCollection {
    id: i64,
    name: String,
    permission: &'static str,
}

/// Collections visible to the caller (or, for admins, an arbitrary
/// `user_id`), each annotated with the caller's effective permission
/// (spec §4.8's read/write resolution).
async fn collections_for_user(State(ctx): State<AppState>, user: AuthUser, Query(q): Query<CollectionsQuery>) -> Result<Json<Vec<UserCollection>>, AppError> {
    let target = match &q.user_id {
        Some(id) if id != &user.user_id => {
            user.require_admin(&ctx)?;
            id.as_str()
        }
        _ => user.user_id.as_str(),
    };

    let acl = ctx.acl();
    let mut out = Vec::new();
    for (id, name) in ctx.repo().list_collections_for_user(target)? {
        let permission = match acl.effective_permission(target, id.0)? {
            Some(Permission::Write) => "write",
            Some(Permission::Read) => "read",
            None => continue,
        };
        out.push(UserCollection { id: id.0, name, permission });
    }
    Ok(Json(out))
}

#[derive(Deserialize)]
struct DeleteCollectionRequest {
    name: String,
}

async fn delete_collection(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<DeleteCollectionRequest>) -> Result<StatusCode, AppError> {
    let repo = ctx.repo();
    let id = repo.collection_id_by_name(&req.name)?.ok_or_else(|| AppError::NotFound(format!("collection not found: {}", req.name)))?;

    if !ctx.acl().can_delete(&user.user_id, id.0)? {
        return Err(AppError::Forbidden);
    }

    repo.delete_collection(id)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct ReplacePermissionsRequest {
    collection: String,
    entries: Vec<PermissionEntry>,
}

#[derive(Deserialize)]
struct PermissionEntry {
    group_id: String,
    can_read: bool,
    can_write: bool,
    can_delete: bool,
}

#[derive(Serialize)]
struct ReplacePermissionsResponse {
    success: bool,
}

/// Atomically sets a collection's full group-permission set (spec §4.8
/// `replace_permissions`). Restricted to admins and the collection's
/// creator, the same gate as deleting it.
async fn replace_permissions(
    State(ctx): State<AppState>,
    user: AuthUser,
    Json(req): Json<ReplacePermissionsRequest>,
) -> Result<Json<ReplacePermissionsResponse>, AppError> {
    let repo = ctx.repo();
    let id = repo.collection_id_by_name(&req.collection)?.ok_or_else(|| AppError::NotFound(format!("collection not found: {}", req.collection)))?;

    let acl = ctx.acl();
    if !acl.can_delete(&user.user_id, id.0)? {
        return Err(AppError::Forbidden);
    }

    let entries: Vec<(String, bool, bool, bool)> =
        req.entries.into_iter().map(|e| (e.group_id, e.can_read, e.can_write, e.can_delete)).collect();
    acl.replace_permissions(id.0, &entries)?;
    Ok(Json(ReplacePermissionsResponse { success: true }))
}
