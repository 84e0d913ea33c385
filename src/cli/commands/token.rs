use anyhow::{bail, Context, Result};
use chrono::Duration;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::TokenPolicy;

pub const ARG_SECRET: &str = "secret";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL_SECONDS: &str = "refresh-token-ttl-seconds";

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
    pub issuer: String,
    pub policy: TokenPolicy,
}

impl Options {
    /// # Errors
    /// Returns an error if the secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_SECRET)
            .cloned()
            .context("missing required argument: --secret")?;

        if secret.trim().is_empty() {
            bail!("--secret must not be empty");
        }

        let issuer = matches
            .get_one::<String>(ARG_ISSUER)
            .cloned()
            .context("missing required argument: --issuer")?;

        let access = matches
            .get_one::<i64>(ARG_ACCESS_TOKEN_TTL_SECONDS)
            .copied()
            .context("missing required argument: --access-token-ttl-seconds")?;
        let refresh = matches
            .get_one::<i64>(ARG_REFRESH_TOKEN_TTL_SECONDS)
            .copied()
            .context("missing required argument: --refresh-token-ttl-seconds")?;

        Ok(Self {
            secret: SecretString::from(secret),
            issuer,
            policy: TokenPolicy::new(Duration::seconds(access), Duration::seconds(refresh)),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECRET)
                .long(ARG_SECRET)
                .help("HMAC key used to sign and verify tokens")
                .env("AUTHGATE_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer written into and required from every token")
                .env("AUTHGATE_ISSUER")
                .default_value("authgate"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access token lifetime in seconds")
                .env("AUTHGATE_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("10800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .long(ARG_REFRESH_TOKEN_TTL_SECONDS)
                .help("Refresh token lifetime in seconds")
                .env("AUTHGATE_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("259200")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
}
