//! Persistence for users and sessions.
//!
//! Handlers and the auth gate only see the [`UserDirectory`] and
//! [`SessionStore`] traits so that the Postgres implementation can be swapped
//! for [`memory::MemoryStore`] in tests.
//!
//! Lookups by username or token return the most recently inserted match. The
//! schema also carries unique indexes on those columns, so in practice there is
//! at most one match.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("record not found")]
    NotFound,
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A user row, including the stored credential hash.
#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when registering a user.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub password_hash: String,
}

/// A persisted login session.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: i64,
    pub user_id: Uuid,
    pub token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when a login creates a session.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub user_id: Uuid,
    pub token: String,
    pub refresh_token: String,
    pub token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new user.
    ///
    /// # Errors
    /// [`StoreError::DuplicateUser`] if the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    /// Latest user with the given username.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no user matches.
    async fn find_by_username(&self, username: &str) -> Result<User, StoreError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// # Errors
    /// Returns an error on constraint violation or connection failure.
    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError>;

    /// Latest session whose access token equals `token`.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no session matches.
    async fn find_by_token(&self, token: &str) -> Result<Session, StoreError>;

    /// Remove every session whose access token equals `token`, returning how
    /// many rows were deleted. Deleting an unknown token is not an error.
    ///
    /// # Errors
    /// Returns an error on connection failure.
    async fn delete_by_token(&self, token: &str) -> Result<u64, StoreError>;

    /// Overwrite the access token and its expiry on the sessions located by
    /// `refresh_token`. The refresh token itself is left untouched.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no session carries that refresh token.
    async fn update_token_by_refresh_token(
        &self,
        refresh_token: &str,
        token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<u64, StoreError>;
}

/// Everything the service needs from its backing store.
#[async_trait]
pub trait Store: UserDirectory + SessionStore {
    /// Cheap connectivity check used by `/health`.
    ///
    /// # Errors
    /// Returns an error if the store is unreachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

impl std::fmt::Debug for dyn Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Store")
    }
}
