use crate::{
    api::{self, AuthState},
    auth::{PasswordHasher, TokenIssuer, TokenPolicy},
    cli::telemetry,
    store::PgStore,
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub request_timeout: Duration,
    pub db_max_connections: u32,
    pub db_timeout: Duration,
    pub secret: SecretString,
    pub issuer: String,
    pub policy: TokenPolicy,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the schema cannot be
/// applied, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let store = PgStore::connect(
        args.dsn.expose_secret(),
        args.db_max_connections,
        args.db_timeout,
    )
    .await
    .context("Failed to connect to database")?;

    store.migrate().await.context("Failed to apply schema")?;

    debug!("schema applied");

    let tokens = TokenIssuer::new(&args.secret, args.issuer, args.policy);
    let state = Arc::new(AuthState::new(
        Arc::new(store),
        PasswordHasher::default(),
        tokens,
    ));

    info!(
        "access tokens live {}s, refresh tokens {}s",
        args.policy.access.num_seconds(),
        args.policy.refresh.num_seconds()
    );

    let result = api::new(args.port, state, args.request_timeout).await;

    telemetry::shutdown_tracer();

    result
}
