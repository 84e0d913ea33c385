//! Maps parsed arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{database, token, ARG_DSN, ARG_PORT, ARG_REQUEST_TIMEOUT_SECONDS};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or the secret is blank.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let request_timeout = matches
        .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
        .copied()
        .map(Duration::from_secs)
        .context("missing required argument: --request-timeout-seconds")?;

    let database = database::Options::parse(matches)?;
    let token = token::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        request_timeout,
        db_max_connections: database.max_connections,
        db_timeout: database.timeout,
        secret: token.secret,
        issuer: token.issuer,
        policy: token.policy,
    }))
}
