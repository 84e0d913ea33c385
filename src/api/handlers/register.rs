use crate::{
    api::{
        handlers::{error::ErrorBody, valid_full_name, valid_password, valid_username, ApiError},
        AuthState,
    },
    store::NewUser,
};
use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(ToSchema, Deserialize)]
pub struct RegisterRequest {
    username: String,
    password: String,
    full_name: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// The stored user, without its credential hash.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
}

#[utoipa::path(
    post,
    path= "/register",
    request_body = RegisterRequest,
    responses (
        (status = 200, description = "Registration successful", body = UserResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 409, description = "Username already taken", body = ErrorBody),
        (status = 500, description = "Hashing or persistence failed", body = ErrorBody),
    ),
    tag= "register"
)]
#[instrument(skip(auth, payload))]
pub async fn register(
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Json<UserResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let username = request.username.trim().to_string();
    let full_name = request.full_name.trim().to_string();

    if !valid_username(&username) {
        return Err(ApiError::Validation("Invalid username".to_string()));
    }

    if !valid_password(&request.password) {
        return Err(ApiError::Validation("Invalid password".to_string()));
    }

    if !valid_full_name(&full_name) {
        return Err(ApiError::Validation("Invalid full_name".to_string()));
    }

    let password_hash = auth.hasher().hash_blocking(request.password).await?;

    let user = auth
        .store()
        .create_user(NewUser {
            username,
            full_name,
            password_hash,
        })
        .await?;

    info!("registered user {}", user.username);

    Ok(Json(UserResponse {
        id: user.id,
        username: user.username,
        full_name: user.full_name,
    }))
}
