//! Route handlers and the request checks they share.

pub mod error;
pub mod extract;
pub mod health;
pub mod login;
pub mod logout;
pub mod me;
pub mod refresh;
pub mod register;

pub use self::error::ApiError;

use regex::Regex;

pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_FULL_NAME_LEN: usize = 128;

/// Letters, digits, `_`, `.` and `-`, at most [`MAX_USERNAME_LEN`] characters.
pub fn valid_username(username: &str) -> bool {
    username.len() <= MAX_USERNAME_LEN
        && Regex::new(r"^[A-Za-z0-9_.\-]+$").is_ok_and(|re| re.is_match(username))
}

/// Any non-blank password is accepted; strength rules are out of scope here.
pub fn valid_password(password: &str) -> bool {
    !password.trim().is_empty()
}

pub fn valid_full_name(full_name: &str) -> bool {
    let trimmed = full_name.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= MAX_FULL_NAME_LEN
}
