//! Failure kinds seen by HTTP callers.
//!
//! Components return their own typed errors; this is the only place where a
//! failure becomes a status code. Internal details go to the log, never to the
//! response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{
    auth::{AuthError, HashError, TokenError},
    store::StoreError,
};

pub const UNAUTHORIZED: &str = "Unauthorized";
pub const INVALID_CREDENTIALS: &str = "invalid username or password";
pub const INTERNAL: &str = "internal server error";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Unauthorized(#[from] AuthError),
    #[error("invalid credentials for {0}")]
    InvalidCredentials(String),
    #[error("user already exists: {0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUser(username) => Self::Conflict(username),
            other => Self::Internal(format!("store: {other}")),
        }
    }
}

impl From<HashError> for ApiError {
    fn from(err: HashError) -> Self {
        Self::Internal(format!("password hashing: {err}"))
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        Self::Internal(format!("token: {err}"))
    }
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidCredentials(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Unauthorized(_) => UNAUTHORIZED.to_string(),
            Self::InvalidCredentials(_) => INVALID_CREDENTIALS.to_string(),
            Self::Conflict(_) => "User already exists".to_string(),
            Self::Internal(_) => INTERNAL.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(detail) => error!("request failed: {detail}"),
            Self::Unauthorized(AuthError::Store(err)) => {
                error!("session lookup failed: {err}");
            }
            other => debug!("request rejected: {other}"),
        }

        // A store failure inside the gate is ours, not the caller's.
        let status = match &self {
            Self::Unauthorized(AuthError::Store(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            other => other.status(),
        };
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            INTERNAL.to_string()
        } else {
            self.public_message()
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
