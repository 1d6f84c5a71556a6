//! Per-user system prompt template endpoints (supplemented feature, see
//! SPEC_FULL.md §2 and `rag_service::system_messages`).

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/system-messages", get(list_templates).post(save_template))
        .route("/api/system-messages/select", post(select_template))
        .route("/api/system-messages/delete", post(delete_template))
}

impl From<rag_service::SystemMessageError> for AppError {
    fn from(err: rag_service::SystemMessageError) -> Self {
        match err {
            rag_service::SystemMessageError::NotFound(name) => AppError::NotFound(format!("system message template not found: {name}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

async fn list_templates(State(ctx): State<AppState>, user: AuthUser) -> Result<Json<Vec<rag_service::SystemMessageTemplate>>, AppError> {
    Ok(Json(ctx.system_messages().list(&user.user_id)?))
}

#[derive(Deserialize)]
struct SaveTemplateRequest {
    name: String,
    message: String,
    #[serde(default)]
    description: String,
}

async fn save_template(
    State(ctx): State<AppState>,
    user: AuthUser,
    Json(req): Json<SaveTemplateRequest>,
) -> Result<(StatusCode, Json<rag_service::SystemMessageTemplate>), AppError> {
    let template = ctx.system_messages().save(&user.user_id, &req.name, &req.message, &req.description)?;
    Ok((StatusCode::CREATED, Json(template)))
}

#[derive(Deserialize)]
struct NameRequest {
    name: String,
}

async fn select_template(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<NameRequest>) -> Result<StatusCode, AppError> {
    ctx.system_messages().select(&user.user_id, &req.name)?;
    Ok(StatusCode::OK)
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_template(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<NameRequest>) -> Result<Json<DeleteResponse>, AppError> {
    ctx.system_messages().delete(&user.user_id, &req.name)?;
    Ok(Json(DeleteResponse { deleted: true }))
}
