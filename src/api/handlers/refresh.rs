use crate::{
    api::{
        handlers::{error::ErrorBody, extract::RefreshGrant, ApiError},
        AuthState,
    },
    auth::TokenPurpose,
    store::StoreError,
};
use axum::{extract::Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RefreshResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path= "/refresh-token",
    responses (
        (status = 200, description = "New access token", body = RefreshResponse),
        (status = 401, description = "Missing, invalid or expired refresh token", body = ErrorBody),
        (status = 500, description = "Token or persistence failure", body = ErrorBody),
    ),
    params(
        ("Authorization" = String, Header, description = "Refresh token, optionally prefixed with `Bearer `")
    ),
    tag= "session"
)]
#[instrument(skip(auth, grant), fields(username = %grant.identity.username))]
pub async fn refresh_token(
    auth: Extension<Arc<AuthState>>,
    grant: RefreshGrant,
) -> Result<Json<RefreshResponse>, ApiError> {
    let now = Utc::now();
    let tokens = auth.tokens();
    let token = tokens.issue(&grant.identity, TokenPurpose::Access, now)?;
    let expires_at = tokens.policy().expires_at(TokenPurpose::Access, now);

    // The refresh token is not rotated; it keeps working until it expires.
    match auth
        .store()
        .update_token_by_refresh_token(&grant.refresh_token, &token, expires_at)
        .await
    {
        Ok(updated) => debug!("refreshed access token on {updated} session(s)"),
        Err(StoreError::NotFound) => {
            warn!("no session carries this refresh token; issued token will not authenticate");
        }
        Err(err) => return Err(err.into()),
    }

    Ok(Json(RefreshResponse { token }))
}
