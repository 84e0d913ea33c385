//! # Authgate (user authentication and sessions)
//!
//! `authgate` registers users, logs them in and keeps track of their sessions.
//!
//! ## Tokens and sessions
//!
//! A successful login issues two signed tokens: a short lived access token and
//! a longer lived refresh token. Both are stored together in a session row.
//! The signature alone is never enough to authenticate a request; the access
//! token must also still be present in the session store and not be past its
//! expiry. Deleting the row on logout is what revokes a token.
//!
//! ## Refresh
//!
//! `POST /refresh-token` accepts the refresh token, checks its signature and
//! expiry, mints a new access token and overwrites the access token on the
//! session row located by that refresh token. The refresh token itself is not
//! rotated and stays usable until it expires.
//!
//! ## Errors
//!
//! Authentication failures are reported as a generic `401 Unauthorized` and
//! login failures as a generic `404` so that callers cannot tell which check
//! failed or whether a username exists.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
