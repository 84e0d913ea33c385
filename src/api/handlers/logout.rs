use crate::api::{
    handlers::{error::ErrorBody, extract::credential, ApiError},
    AuthState,
};
use axum::{extract::Extension, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    pub message: String,
}

#[utoipa::path(
    post,
    path= "/logout",
    responses (
        (status = 200, description = "Session removed, or there was none", body = LogoutResponse),
        (status = 500, description = "Store failure", body = ErrorBody),
    ),
    params(
        ("Authorization" = String, Header, description = "Access token, optionally prefixed with `Bearer `")
    ),
    tag= "session"
)]
#[instrument(skip(auth, headers))]
pub async fn logout(
    auth: Extension<Arc<AuthState>>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let token = credential(&headers);
    let removed = auth.store().delete_by_token(&token).await?;

    debug!("logout removed {removed} session(s)");

    Ok(Json(LogoutResponse {
        message: "logged out".to_string(),
    }))
}
