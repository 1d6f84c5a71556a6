//! Bearer-token authentication middleware (component C10, spec §4.10 step 1).
//!
//! Revocation is enforced at `/logout` and re-login (both flip the `sessions`
//! row inactive); the bearer token carried on every other request is
//! validated statelessly against its JWT signature and expiry, matching
//! `identity::token`'s design note that the opaque session id, not the JWT,
//! is the thing ever individually revoked.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::RequestPartsExt;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::error::AppError;
use crate::state::AppState;

pub struct AuthUser {
    pub user_id: String,
    pub username: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AppState::from_ref(state);
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthenticated)?;

        let claims = identity::token::verify(&ctx.config().jwt_secret_key, bearer.token()).map_err(|_| AppError::Unauthenticated)?;
        Ok(AuthUser { user_id: claims.sub, username: claims.username })
    }
}

impl AuthUser {
    pub fn require_admin(&self, ctx: &rag_service::AppContext) -> Result<(), AppError> {
        if ctx.auth().is_admin(&self.user_id).map_err(AppError::from)? {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

pub const UNAUTHORIZED: StatusCode = StatusCode::UNAUTHORIZED;
