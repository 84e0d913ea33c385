//! Request authentication.
//!
//! Flow Overview: reject an empty credential, require a live session row for
//! the token, verify the signature, then compare the expiry to the clock. The
//! refresh variant skips the session lookup because session rows are keyed by
//! the access token; the refresh handler updates the row itself afterwards.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::token::{Identity, TokenError, TokenIssuer, TokenPurpose};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("no session for token")]
    NoSession,
    #[error("invalid token: {0}")]
    InvalidSignature(#[source] TokenError),
    #[error("token expired")]
    Expired,
    #[error("session lookup failed: {0}")]
    Store(StoreError),
}

#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn Store>,
    tokens: Arc<TokenIssuer>,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AuthGate {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, tokens: Arc<TokenIssuer>) -> Self {
        Self { store, tokens }
    }

    /// Authenticate an access token against the current time.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub async fn authenticate(&self, raw_token: &str) -> Result<Identity, AuthError> {
        self.authenticate_at(raw_token, Utc::now()).await
    }

    /// Authenticate an access token as of `now`.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub async fn authenticate_at(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthError> {
        if raw_token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let session = match self.store.find_by_token(raw_token).await {
            Ok(session) => session,
            Err(StoreError::NotFound) => return Err(AuthError::NoSession),
            Err(err) => return Err(AuthError::Store(err)),
        };

        let claims = self
            .tokens
            .validate_for(raw_token, TokenPurpose::Access)
            .map_err(AuthError::InvalidSignature)?;

        // Either expiry being past is enough.
        if claims.is_expired_at(now) || now > session.token_expires_at {
            debug!("token for {} expired at {}", claims.username, claims.exp);
            return Err(AuthError::Expired);
        }

        Ok(claims.identity())
    }

    /// Authenticate a refresh token against the current time.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn authenticate_for_refresh(&self, raw_token: &str) -> Result<Identity, AuthError> {
        self.authenticate_for_refresh_at(raw_token, Utc::now())
    }

    /// Authenticate a refresh token as of `now`, by signature and expiry only.
    ///
    /// # Errors
    /// Returns the first check that failed.
    pub fn authenticate_for_refresh_at(
        &self,
        raw_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Identity, AuthError> {
        if raw_token.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let claims = self
            .tokens
            .validate_for(raw_token, TokenPurpose::Refresh)
            .map_err(AuthError::InvalidSignature)?;

        if claims.is_expired_at(now) {
            debug!("refresh token for {} expired at {}", claims.username, claims.exp);
            return Err(AuthError::Expired);
        }

        Ok(claims.identity())
    }
}
