//! Identity and session endpoints (components C8/C9, spec §6).

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use identity::AuthError;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{login_error_response, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/register", post(register))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/check-auth", get(check_auth))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/auth/groups", get(list_groups))
        .route("/api/auth/groups/create", post(create_group))
        .route("/api/auth/groups/update", post(update_group))
        .route("/api/auth/groups/delete", post(delete_group))
        .route("/api/auth/groups/groupusers", post(group_users))
        .route("/api/auth/users/grouplist", get(user_group_list))
        .route("/api/auth/users/savegroups", post(save_user_groups))
        .route("/api/auth/users/assigngroup", post(assign_group))
        .route("/api/auth/users/deletegroup", delete(remove_group))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    token: String,
    username: String,
    group_id: Option<String>,
    user_id: String,
}

async fn login(State(ctx): State<AppState>, jar: CookieJar, Json(req): Json<LoginRequest>) -> Response {
    let auth = ctx.auth();
    match auth.login(&req.username, &req.password) {
        Ok(result) => {
            let group_id = ctx.acl().user_groups(&result.user.id).ok().and_then(|g| g.into_iter().next());
            let cookie = Cookie::build(("session_id", result.session_id.clone()))
                .http_only(true)
                .secure(true)
                .same_site(SameSite::Lax)
                .path("/")
                .build();
            let body = LoginResponse { token: result.token, username: result.user.username, group_id, user_id: result.user.id };
            (jar.add(cookie), Json(body)).into_response()
        }
        Err(AuthError::UserNotFound) => login_error_response(StatusCode::UNAUTHORIZED, "user not found", "USER_NOT_FOUND"),
        Err(AuthError::UserInactive) => login_error_response(StatusCode::UNAUTHORIZED, "account is not yet active", "USER_INACTIVE"),
        Err(AuthError::InvalidPassword) => login_error_response(StatusCode::UNAUTHORIZED, "incorrect password", "INVALID_PASSWORD"),
        Err(e) => AppError::from(e).into_response(),
    }
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Serialize)]
struct RegisterResponse {
    username: String,
}

async fn register(State(ctx): State<AppState>, Json(req): Json<RegisterRequest>) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let user = ctx.auth().register(&req.username, &req.email, &req.password)?;
    Ok((StatusCode::CREATED, Json(RegisterResponse { username: user.username })))
}

async fn logout(State(ctx): State<AppState>, jar: CookieJar) -> Result<impl IntoResponse, AppError> {
    if let Some(cookie) = jar.get("session_id") {
        ctx.auth().logout(cookie.value())?;
    }
    Ok((jar.remove(Cookie::from("session_id")), StatusCode::OK))
}

#[derive(Serialize)]
struct CheckAuthResponse {
    authenticated: bool,
    username: String,
    user_id: String,
    is_admin: bool,
}

async fn check_auth(State(ctx): State<AppState>, user: AuthUser) -> Result<Json<CheckAuthResponse>, AppError> {
    let is_admin = ctx.auth().is_admin(&user.user_id)?;
    Ok(Json(CheckAuthResponse { authenticated: true, username: user.username, user_id: user.user_id, is_admin }))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

#[derive(Serialize)]
struct ChangePasswordResponse {
    success: bool,
    message: String,
}

async fn change_password(
    State(ctx): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<ChangePasswordResponse>, AppError> {
    ctx.auth().change_password(&user.user_id, &req.current_password, &req.new_password)?;
    Ok(Json(ChangePasswordResponse { success: true, message: "password updated".to_string() }))
}

#[derive(Serialize)]
struct GroupSummary {
    id: String,
    name: String,
}

async fn list_groups(State(ctx): State<AppState>, _user: AuthUser) -> Result<Json<Vec<GroupSummary>>, AppError> {
    let groups = ctx.acl().list_groups()?.into_iter().map(|(id, name)| GroupSummary { id, name }).collect();
    Ok(Json(groups))
}

#[derive(Deserialize)]
struct CreateGroupRequest {
    name: String,
}

#[derive(Serialize)]
struct CreateGroupResponse {
    id: String,
}

async fn create_group(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<CreateGroupRequest>) -> Result<Json<CreateGroupResponse>, AppError> {
    user.require_admin(&ctx)?;
    let id = ctx.acl().create_group(&req.name)?;
    Ok(Json(CreateGroupResponse { id }))
}

#[derive(Deserialize)]
struct UpdateGroupRequest {
    group_id: String,
    name: String,
}

async fn update_group(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<UpdateGroupRequest>) -> Result<StatusCode, AppError> {
    user.require_admin(&ctx)?;
    ctx.acl().update_group(&req.group_id, &req.name)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct DeleteGroupRequest {
    group_id: String,
}

async fn delete_group(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<DeleteGroupRequest>) -> Result<StatusCode, AppError> {
    user.require_admin(&ctx)?;
    ctx.acl().delete_group(&req.group_id)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct GroupUsersRequest {
    group_id: String,
}

async fn group_users(State(ctx): State<AppState>, _user: AuthUser, Json(req): Json<GroupUsersRequest>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(ctx.acl().group_members(&req.group_id)?))
}

async fn user_group_list(State(ctx): State<AppState>, user: AuthUser) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(ctx.acl().user_groups(&user.user_id)?))
}

#[derive(Deserialize)]
struct SaveGroupsRequest {
    user_id: String,
    group_ids: Vec<String>,
}

async fn save_user_groups(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<SaveGroupsRequest>) -> Result<StatusCode, AppError> {
    user.require_admin(&ctx)?;
    ctx.acl().replace_groups(&req.user_id, &req.group_ids)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct AssignGroupRequest {
    user_id: String,
    group_id: String,
}

async fn assign_group(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<AssignGroupRequest>) -> Result<StatusCode, AppError> {
    user.require_admin(&ctx)?;
    ctx.acl().assign_group(&req.user_id, &req.group_id)?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
struct RemoveGroupRequest {
    user_id: String,
    group_id: String,
}

async fn remove_group(State(ctx): State<AppState>, user: AuthUser, Json(req): Json<RemoveGroupRequest>) -> Result<StatusCode, AppError> {
    user.require_admin(&ctx)?;
    ctx.acl().remove_group(&req.user_id, &req.group_id)?;
    Ok(StatusCode::OK)
}
