//! Postgres implementation of the user directory and session store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::{future::Future, time::Duration};
use tracing::{debug, info_span, Instrument, Span};

use super::{NewSession, NewUser, Session, SessionStore, Store, StoreError, User, UserDirectory};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const SESSION_COLUMNS: &str = "id, user_id, token, refresh_token, token_expires_at, \
     refresh_token_expires_at, created_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    /// Wrap a pool; every store call gives up after `timeout`.
    #[must_use]
    pub const fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Open a pool against `dsn`. Acquiring a connection is bounded by the
    /// same `timeout` as the store calls.
    ///
    /// # Errors
    /// Returns an error if the first connection cannot be established.
    pub async fn connect(
        dsn: &str,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .acquire_timeout(timeout)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;

        Ok(Self::new(pool, timeout))
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables and indexes if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await?;

        for statement in split_sql_statements(SCHEMA_SQL) {
            debug!("applying schema statement: {statement}");
            sqlx::query(&statement).execute(&mut *conn).await?;
        }

        Ok(())
    }

    async fn timed<T, F>(&self, span: Span, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut.instrument(span)).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        created_at: row.get("created_at"),
    }
}

fn session_from_row(row: &PgRow) -> Session {
    Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        refresh_token: row.get("refresh_token"),
        token_expires_at: row.get("token_expires_at"),
        refresh_token_expires_at: row.get("refresh_token_expires_at"),
        created_at: row.get("created_at"),
    }
}

/// Split a schema file into individual statements, dropping comments and
/// `psql` meta commands.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") || trimmed.starts_with('\\') {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let query = r"
            INSERT INTO users (username, full_name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, full_name, password_hash, created_at
        ";
        let result = self
            .timed(
                query_span("INSERT", query),
                sqlx::query(query)
                    .bind(&user.username)
                    .bind(&user.full_name)
                    .bind(&user.password_hash)
                    .fetch_one(&self.pool),
            )
            .await;

        match result {
            Ok(row) => Ok(user_from_row(&row)),
            Err(StoreError::Database(err)) if is_unique_violation(&err) => {
                Err(StoreError::DuplicateUser(user.username))
            }
            Err(err) => Err(err),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<User, StoreError> {
        let query = r"
            SELECT id, username, full_name, password_hash, created_at
            FROM users
            WHERE username = $1
            ORDER BY created_at DESC
            LIMIT 1
        ";
        let row = self
            .timed(
                query_span("SELECT", query),
                sqlx::query(query).bind(username).fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(user_from_row).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: NewSession) -> Result<Session, StoreError> {
        let query = format!(
            r"
            INSERT INTO user_sessions
                (user_id, token, refresh_token, token_expires_at, refresh_token_expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {SESSION_COLUMNS}
            "
        );
        let row = self
            .timed(
                query_span("INSERT", &query),
                sqlx::query(&query)
                    .bind(session.user_id)
                    .bind(&session.token)
                    .bind(&session.refresh_token)
                    .bind(session.token_expires_at)
                    .bind(session.refresh_token_expires_at)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(session_from_row(&row))
    }

    async fn find_by_token(&self, token: &str) -> Result<Session, StoreError> {
        let query = format!(
            "SELECT {SESSION_COLUMNS} FROM user_sessions WHERE token = $1 ORDER BY id DESC LIMIT 1"
        );
        let row = self
            .timed(
                query_span("SELECT", &query),
                sqlx::query(&query).bind(token).fetch_optional(&self.pool),
            )
            .await?;

        row.as_ref().map(session_from_row).ok_or(StoreError::NotFound)
    }

    async fn delete_by_token(&self, token: &str) -> Result<u64, StoreError> {
        let query = "DELETE FROM user_sessions WHERE token = $1";
        let result = self
            .timed(
                query_span("DELETE", query),
                sqlx::query(query).bind(token).execute(&self.pool),
            )
            .await?;

        Ok(result.rows_affected())
    }

    async fn update_token_by_refresh_token(
        &self,
        refresh_token: &str,
        token: &str,
        token_expires_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let query =
            "UPDATE user_sessions SET token = $1, token_expires_at = $2 WHERE refresh_token = $3";
        let result = self
            .timed(
                query_span("UPDATE", query),
                sqlx::query(query)
                    .bind(token)
                    .bind(token_expires_at)
                    .bind(refresh_token)
                    .execute(&self.pool),
            )
            .await?;

        match result.rows_affected() {
            0 => Err(StoreError::NotFound),
            updated => Ok(updated),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.timed(acquire_span, self.pool.acquire()).await?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        self.timed(ping_span, conn.ping()).await
    }
}
