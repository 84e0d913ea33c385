//! Extractors that run the auth gate before a handler body.
//!
//! A handler that takes [`CurrentUser`] only runs for a live, unexpired,
//! session-backed access token. [`RefreshGrant`] checks a refresh token by
//! signature and expiry only.

use axum::{
    async_trait,
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;

use super::ApiError;
use crate::{api::AuthState, auth::Identity};

const BEARER: &str = "Bearer ";

/// Raw credential from the `Authorization` header, with an optional `Bearer `
/// prefix (any case) removed. Missing or non-ASCII headers read as empty.
#[must_use]
pub fn credential(headers: &HeaderMap) -> String {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .trim_start();

    let token = match (value.get(..BEARER.len()), value.get(BEARER.len()..)) {
        (Some(scheme), Some(rest)) if scheme.eq_ignore_ascii_case(BEARER) => rest,
        _ => value,
    };

    token.trim().to_string()
}

async fn auth_state<S: Send + Sync>(
    parts: &mut Parts,
    state: &S,
) -> Result<Arc<AuthState>, ApiError> {
    Extension::<Arc<AuthState>>::from_request_parts(parts, state)
        .await
        .map(|Extension(auth)| auth)
        .map_err(|err| ApiError::Internal(format!("auth state missing: {err}")))
}

/// Identity behind an authenticated access token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = auth_state(parts, state).await?;
        let token = credential(&parts.headers);
        let identity = auth.gate().authenticate(&token).await?;

        Ok(Self(identity))
    }
}

/// A verified refresh token together with the identity it was issued to.
#[derive(Debug, Clone)]
pub struct RefreshGrant {
    pub identity: Identity,
    pub refresh_token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for RefreshGrant
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = auth_state(parts, state).await?;
        let refresh_token = credential(&parts.headers);
        let identity = auth.gate().authenticate_for_refresh(&refresh_token)?;

        Ok(Self {
            identity,
            refresh_token,
        })
    }
}
