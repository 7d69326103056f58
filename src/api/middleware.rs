//! Session authentication for protected routes.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::{error::internal_error, ApiError, AppState};
use crate::auth;
use crate::models::User;

/// The caller of a protected route, inserted as a request extension.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Resolves the `sp_token` cookie or bearer token to a user.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = auth::token_from_headers(request.headers()) else {
        tracing::debug!("Missing session token");
        return Err(ApiError::unauthorized());
    };

    let user = state
        .db
        .get_user_by_token(&token)
        .map_err(internal_error)?
        .ok_or_else(|| {
            tracing::warn!("Invalid or expired session token");
            ApiError::Unauthorized("Invalid token".to_string())
        })?;

    request.extensions_mut().insert(AuthUser { user, token });
    Ok(next.run(request).await)
}
