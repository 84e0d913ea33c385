//! End-to-end flows through the HTTP router over the in-memory store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use authgate::{
    api::{self, AuthState},
    auth::{PasswordHasher, TokenIssuer, TokenPolicy, TokenPurpose},
    store::{
        MemoryStore, NewSession, NewUser, Session, SessionStore, Store, StoreError, User,
        UserDirectory,
    },
};
use chrono::{DateTime, Utc};
use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    response::Response,
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    tokens: TokenIssuer,
}

impl TestApp {
    fn new() -> Result<Self> {
        // Cheap parameters keep the suite fast.
        Ok(Self::with_hasher(PasswordHasher::with_params(1024, 1, 1)?))
    }

    fn with_hasher(hasher: PasswordHasher) -> Self {
        let store = Arc::new(MemoryStore::new());
        let secret = SecretString::from(SECRET.to_string());
        let tokens = TokenIssuer::new(&secret, "authgate", TokenPolicy::default());
        let state = Arc::new(AuthState::new(store.clone(), hasher, tokens.clone()));

        Self {
            router: api::router(state, Duration::from_secs(30)),
            store,
            tokens,
        }
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response: Response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        Ok((status, body))
    }

    async fn post_json(&self, uri: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body)?))?;
        self.send(request).await
    }

    async fn with_token(&self, method: Method, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, token)
            .body(Body::empty())?;
        self.send(request).await
    }

    async fn register(&self, username: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.post_json(
            "/register",
            &json!({"username": username, "password": password, "full_name": "Alice Liddell"}),
        )
        .await
    }

    /// Log in and return (access, refresh).
    async fn login(&self, username: &str, password: &str) -> Result<(String, String)> {
        let (status, body) = self
            .post_json("/login", &json!({"username": username, "password": password}))
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");

        let token = body["token"].as_str().context("token missing")?.to_string();
        let refresh = body["refresh_token"]
            .as_str()
            .context("refresh_token missing")?
            .to_string();
        Ok((token, refresh))
    }
}

fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap_or_default()
}

/// A store whose every call times out.
struct UnreachableStore;

fn timed_out<T>() -> Result<T, StoreError> {
    Err(StoreError::Timeout(Duration::from_secs(5)))
}

#[async_trait]
impl UserDirectory for UnreachableStore {
    async fn create_user(&self, _user: NewUser) -> Result<User, StoreError> {
        timed_out()
    }

    async fn find_by_username(&self, _username: &str) -> Result<User, StoreError> {
        timed_out()
    }
}

#[async_trait]
impl SessionStore for UnreachableStore {
    async fn create_session(&self, _session: NewSession) -> Result<Session, StoreError> {
        timed_out()
    }

    async fn find_by_token(&self, _token: &str) -> Result<Session, StoreError> {
        timed_out()
    }

    async fn delete_by_token(&self, _token: &str) -> Result<u64, StoreError> {
        timed_out()
    }

    async fn update_token_by_refresh_token(
        &self,
        _refresh_token: &str,
        _token: &str,
        _token_expires_at: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        timed_out()
    }
}

#[async_trait]
impl Store for UnreachableStore {
    async fn ping(&self) -> Result<(), StoreError> {
        timed_out()
    }
}

fn unreachable_router() -> Result<Router> {
    let secret = SecretString::from(SECRET.to_string());
    let tokens = TokenIssuer::new(&secret, "authgate", TokenPolicy::default());
    let hasher = PasswordHasher::with_params(1024, 1, 1)?;
    let state = Arc::new(AuthState::new(Arc::new(UnreachableStore), hasher, tokens));
    Ok(api::router(state, Duration::from_secs(30)))
}

#[tokio::test]
async fn alice_session_lifecycle() -> Result<()> {
    let app = TestApp::new()?;

    let (status, body) = app.register("alice", "pw1").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["full_name"], "Alice Liddell");
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    let (t1, r1) = app.login("alice", "pw1").await?;

    let (status, body) = app.with_token(Method::GET, "/me", &t1).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");

    let (status, _) = app.with_token(Method::POST, "/logout", &t1).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.with_token(Method::GET, "/me", &t1).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Unauthorized");

    // The refresh token was never invalidated.
    let (status, body) = app.with_token(Method::POST, "/refresh-token", &r1).await?;
    assert_eq!(status, StatusCode::OK);
    let t2 = body["token"].as_str().context("token missing")?;
    assert_ne!(t2, t1);

    let claims = app.tokens.validate_for(t2, TokenPurpose::Access)?;
    assert_eq!(claims.username, "alice");
    Ok(())
}

#[tokio::test]
async fn login_tokens_carry_claims() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice", "pw1").await?;

    let (token, refresh) = app.login("alice", "pw1").await?;

    let access = app.tokens.validate_for(&token, TokenPurpose::Access)?;
    assert_eq!(access.username, "alice");
    assert_eq!(access.full_name, "Alice Liddell");
    assert_eq!(access.iss, "authgate");
    assert_eq!(access.exp - access.iat, 3 * 60 * 60);

    let refresh = app.tokens.validate_for(&refresh, TokenPurpose::Refresh)?;
    assert_eq!(refresh.exp - refresh.iat, 72 * 60 * 60);

    let session = app.store.find_by_token(&token).await?;
    assert_eq!(session.token_expires_at.timestamp(), access.exp);
    assert_eq!(session.refresh_token_expires_at.timestamp(), refresh.exp);
    Ok(())
}

#[tokio::test]
async fn refresh_twice_without_rotation() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice", "pw1").await?;
    let (_, refresh) = app.login("alice", "pw1").await?;

    let (status, first) = app
        .with_token(Method::POST, "/refresh-token", &format!("Bearer {refresh}"))
        .await?;
    assert_eq!(status, StatusCode::OK);
    let (status, second) = app.with_token(Method::POST, "/refresh-token", &refresh).await?;
    assert_eq!(status, StatusCode::OK);

    // Only the newest access token is on the row.
    let latest = second["token"].as_str().context("token missing")?;
    let earlier = first["token"].as_str().context("token missing")?;
    let (status, _) = app.with_token(Method::GET, "/me", latest).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.with_token(Method::GET, "/me", earlier).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn access_token_cannot_refresh() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice", "pw1").await?;
    let (token, _) = app.login("alice", "pw1").await?;

    let (status, body) = app.with_token(Method::POST, "/refresh-token", &token).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Unauthorized");
    Ok(())
}

#[tokio::test]
async fn refresh_without_credential_is_unauthorized() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/refresh-token")
        .body(Body::empty())?;

    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice", "pw1").await?;

    let (unknown_status, unknown) = app
        .post_json("/login", &json!({"username": "bob", "password": "pw1"}))
        .await?;
    let (wrong_status, wrong) = app
        .post_json("/login", &json!({"username": "alice", "password": "nope"}))
        .await?;

    assert_eq!(unknown_status, StatusCode::NOT_FOUND);
    assert_eq!(wrong_status, StatusCode::NOT_FOUND);
    assert_eq!(message(&unknown), "invalid username or password");
    assert_eq!(unknown, wrong);
    assert_eq!(app.store.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_user_login_pays_for_a_hash() -> Result<()> {
    // Costly enough that a skipped verification stands out.
    let app = TestApp::with_hasher(PasswordHasher::with_params(16 * 1024, 3, 1)?);
    app.register("alice", "pw1").await?;

    let unknown = json!({"username": "bob", "password": "pw1"});
    let wrong = json!({"username": "alice", "password": "nope"});

    // Warm up both paths, including the lazily built throwaway digest.
    app.post_json("/login", &unknown).await?;
    app.post_json("/login", &wrong).await?;

    let mut unknown_total = Duration::ZERO;
    let mut wrong_total = Duration::ZERO;
    for _ in 0..3 {
        let started = Instant::now();
        let (status, _) = app.post_json("/login", &unknown).await?;
        unknown_total += started.elapsed();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let started = Instant::now();
        let (status, _) = app.post_json("/login", &wrong).await?;
        wrong_total += started.elapsed();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    assert!(
        unknown_total * 4 >= wrong_total,
        "unknown user {unknown_total:?} vs wrong password {wrong_total:?}"
    );
    Ok(())
}

#[tokio::test]
async fn store_failure_during_auth_is_internal_error() -> Result<()> {
    let router = unreachable_router()?;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/me")
        .header(AUTHORIZATION, "Bearer some.access.token")
        .body(Body::empty())?;

    let response = router.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(message(&body), "internal server error");
    Ok(())
}

#[tokio::test]
async fn health_reports_unreachable_store() -> Result<()> {
    let router = unreachable_router()?;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())?;

    let response = router.oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(response.headers().contains_key("x-app"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["database"], "error");
    Ok(())
}

#[tokio::test]
async fn register_rejects_bad_input() -> Result<()> {
    let app = TestApp::new()?;

    let (status, _) = app
        .post_json("/register", &json!({"username": "alice"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.register("", "pw1").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.register("alice", "").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.register("not a name", "pw1").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))?;
    let (status, _) = app.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.store.find_by_username("alice").await.is_err());
    Ok(())
}

#[tokio::test]
async fn register_duplicate_is_conflict() -> Result<()> {
    let app = TestApp::new()?;
    let (status, _) = app.register("alice", "pw1").await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.register("alice", "pw2").await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // The first password still works.
    app.login("alice", "pw1").await?;
    Ok(())
}

#[tokio::test]
async fn logout_is_idempotent() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice", "pw1").await?;
    let (token, _) = app.login("alice", "pw1").await?;

    for _ in 0..2 {
        let (status, _) = app.with_token(Method::POST, "/logout", &token).await?;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app
        .with_token(Method::POST, "/logout", "never-issued")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.session_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn logout_only_revokes_its_own_session() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice", "pw1").await?;
    let (laptop, _) = app.login("alice", "pw1").await?;
    let (phone, _) = app.login("alice", "pw1").await?;
    assert_ne!(laptop, phone);

    app.with_token(Method::POST, "/logout", &laptop).await?;

    let (status, _) = app.with_token(Method::GET, "/me", &phone).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.with_token(Method::GET, "/me", &laptop).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn forged_token_is_unauthorized() -> Result<()> {
    let app = TestApp::new()?;
    app.register("alice", "pw1").await?;
    let user = app.store.find_by_username("alice").await?;
    let (token, _) = app.login("alice", "pw1").await?;

    // Same claims signed with another key, planted in the session table.
    let other = TokenIssuer::new(
        &SecretString::from("other-secret".to_string()),
        "authgate",
        TokenPolicy::default(),
    );
    let claims = app.tokens.validate(&token)?;
    let forged = other.issue(&claims.identity(), TokenPurpose::Access, chrono::Utc::now())?;
    app.store
        .create_session(authgate::store::NewSession {
            user_id: user.id,
            token: forged.clone(),
            refresh_token: "unused".to_string(),
            token_expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            refresh_token_expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
        })
        .await?;

    let (status, body) = app.with_token(Method::GET, "/me", &forged).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Unauthorized");
    Ok(())
}

#[tokio::test]
async fn health_reports_store_and_request_id() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .body(Body::empty())?;

    let response = app.router.clone().oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-app"));
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(body["database"], "ok");
    assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    Ok(())
}

#[tokio::test]
async fn request_id_is_propagated() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header("x-request-id", "01HZZZZZZZZZZZZZZZZZZZZZZZ")
        .body(Body::empty())?;

    let response = app.router.clone().oneshot(request).await?;
    assert_eq!(
        response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok()),
        Some("01HZZZZZZZZZZZZZZZZZZZZZZZ")
    );
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> Result<()> {
    let app = TestApp::new()?;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/api-docs/openapi.json")
        .body(Body::empty())?;

    let (status, body) = app.send(request).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"].get("/refresh-token").is_some());
    Ok(())
}
