//! In-process store with the same lookup semantics as [`super::PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewSession, NewUser, Session, SessionStore, Store, StoreError, User, UserDirectory};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<Session>,
    next_session_id: i64,
}

/// Rows are kept in insertion order, so "latest match" means "last match".
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, regardless of owner.
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::DuplicateUser(user.username));
        }

        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            full_name: user.full_name,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.push(record.clone());

        Ok(record)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        self.tables
            .read()
            .await
            .users
            .iter()
            .rev()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let mut tables = self.tables.write().await;

        tables.next_session_id += 1;
        let record = Session {
            id: tables.next_session_id,
            user_id: session.user_id,
            token: session.token,
            refresh_token: session.refresh_token,
            token_expires_at: session.token_expires_at,
            refresh_token_expires_at: session.refresh_token_expires_at,
            created_at: Utc::now(),
        };
        tables.sessions.push(record.clone());

        Ok(record)
    }

    async fn find_by_token(&self, token: &str) -> Result<Session, StoreError> {
        self.tables
            .read()
            .await
            .sessions
            .iter()
            .rev()
            .find(|s| s.token == token)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| s.token != token);

        Ok((before - tables.sessions.len()) as u64)
    }

    async fn update_token_by_refresh_token(
        &self,
        refresh_token: &str,
        token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;

        for session in tables
            .sessions
            .iter_mut()
            .filter(|s| s.refresh_token == refresh_token)
        {
            session.token = token.to_string();
            session.token_expires_at = token_expires_at;
            updated += 1;
        }

        match updated {
            0 => Err(StoreError::NotFound),
            updated => Ok(updated),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
