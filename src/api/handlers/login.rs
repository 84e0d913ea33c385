use crate::{
    api::{
        handlers::{error::ErrorBody, valid_password, ApiError},
        AuthState,
    },
    auth::{Identity, TokenPurpose},
    store::{NewSession, StoreError},
};
use axum::{extract::Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub username: String,
    pub full_name: String,
    pub token: String,
    pub refresh_token: String,
}

#[utoipa::path(
    post,
    path= "/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Access and refresh tokens", body = LoginResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorBody),
        (status = 404, description = "Invalid username or password", body = ErrorBody),
        (status = 500, description = "Token or persistence failure", body = ErrorBody),
    ),
    tag= "session"
)]
#[instrument(skip(auth, payload))]
pub async fn login(
    auth: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Some(Json(request)) = payload else {
        return Err(ApiError::Validation("Missing payload".to_string()));
    };

    let username = request.username.trim().to_string();

    if username.is_empty() {
        return Err(ApiError::Validation("Invalid username".to_string()));
    }

    if !valid_password(&request.password) {
        return Err(ApiError::Validation("Invalid password".to_string()));
    }

    // Unknown user and wrong password must look the same to the caller,
    // in body and in time.
    let user = match auth.store().find_by_username(&username).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            auth.hasher().verify_dummy_blocking(request.password).await?;
            return Err(ApiError::InvalidCredentials(username));
        }
        Err(err) => return Err(err.into()),
    };

    let matches = auth
        .hasher()
        .verify_blocking(user.password_hash.clone(), request.password)
        .await?;

    if !matches {
        return Err(ApiError::InvalidCredentials(username));
    }

    let identity = Identity {
        username: user.username.clone(),
        full_name: user.full_name.clone(),
    };

    let now = Utc::now();
    let tokens = auth.tokens();
    let token = tokens.issue(&identity, TokenPurpose::Access, now)?;
    let refresh_token = tokens.issue(&identity, TokenPurpose::Refresh, now)?;

    let session = auth
        .store()
        .create_session(NewSession {
            user_id: user.id,
            token: token.clone(),
            refresh_token: refresh_token.clone(),
            token_expires_at: tokens.policy().expires_at(TokenPurpose::Access, now),
            refresh_token_expires_at: tokens.policy().expires_at(TokenPurpose::Refresh, now),
        })
        .await?;

    debug!("session {} created for {}", session.id, user.username);

    Ok(Json(LoginResponse {
        username: user.username,
        full_name: user.full_name,
        token,
        refresh_token,
    }))
}
