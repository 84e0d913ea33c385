//! Credentials: password hashing, signed tokens and the request gate.

pub mod gate;
pub mod password;
pub mod token;

pub use gate::{AuthError, AuthGate};
pub use password::{HashError, PasswordHasher};
pub use token::{Claims, Identity, TokenError, TokenIssuer, TokenPolicy, TokenPurpose};
