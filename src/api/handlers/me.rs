use crate::api::handlers::{error::ErrorBody, extract::CurrentUser};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct MeResponse {
    pub username: String,
    pub full_name: String,
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Identity behind the access token", body = MeResponse),
        (status = 401, description = "Missing, revoked, invalid or expired token", body = ErrorBody),
    ),
    params(
        ("Authorization" = String, Header, description = "Access token, optionally prefixed with `Bearer `")
    ),
    tag = "session"
)]
pub async fn me(CurrentUser(identity): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        username: identity.username,
        full_name: identity.full_name,
    })
}
