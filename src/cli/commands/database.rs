use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

pub const ARG_DB_MAX_CONNECTIONS: &str = "db-max-connections";
pub const ARG_DB_TIMEOUT_SECONDS: &str = "db-timeout-seconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub max_connections: u32,
    pub timeout: Duration,
}

impl Options {
    /// # Errors
    /// Returns an error if a value is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let max_connections = matches
            .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
            .copied()
            .context("missing required argument: --db-max-connections")?;
        let timeout = matches
            .get_one::<u64>(ARG_DB_TIMEOUT_SECONDS)
            .copied()
            .context("missing required argument: --db-timeout-seconds")?;

        Ok(Self {
            max_connections,
            timeout: Duration::from_secs(timeout),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DB_MAX_CONNECTIONS)
                .long(ARG_DB_MAX_CONNECTIONS)
                .help("Maximum number of pooled database connections")
                .env("AUTHGATE_DB_MAX_CONNECTIONS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_DB_TIMEOUT_SECONDS)
                .long(ARG_DB_TIMEOUT_SECONDS)
                .help("Deadline for acquiring a connection and for each query, in seconds")
                .env("AUTHGATE_DB_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
