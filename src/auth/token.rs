//! Signed bearer tokens.
//!
//! Tokens are HMAC-signed JWTs carrying the user's identity, the issuer, the
//! issue/expiry timestamps and the purpose they were minted for. Validation
//! checks the signature and the claim shape only; comparing `exp` against the
//! clock is left to the caller so that expired tokens can still be inspected.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;

/// The only algorithms accepted when validating. Anything outside the HMAC
/// family is rejected before the signature is checked.
const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Signing(String),
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("bad token signature: {0}")]
    BadSignature(String),
    #[error("invalid token claims: {0}")]
    InvalidClaim(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenPurpose {
    #[serde(rename = "token")]
    Access,
    #[serde(rename = "refresh_token")]
    Refresh,
}

impl TokenPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "token",
            Self::Refresh => "refresh_token",
        }
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifetime of each token purpose.
///
/// Used both for the `exp` claim and for the expiry columns of the session
/// row, so the two never drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            access: Duration::hours(3),
            refresh: Duration::hours(72),
        }
    }
}

impl TokenPolicy {
    #[must_use]
    pub const fn new(access: Duration, refresh: Duration) -> Self {
        Self { access, refresh }
    }

    #[must_use]
    pub const fn duration(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Access => self.access,
            TokenPurpose::Refresh => self.refresh,
        }
    }

    #[must_use]
    pub fn expires_at(&self, purpose: TokenPurpose, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.duration(purpose)
    }
}

/// Who a token was issued to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub full_name: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub purpose: TokenPurpose,
    pub jti: String,
}

impl Claims {
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            full_name: self.full_name.clone(),
        }
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.iat, 0).single()
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    /// Whole-second comparison: a token is expired once `now` is strictly
    /// past `exp`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() > self.exp
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    issuer: String,
    policy: TokenPolicy,
    has_secret: bool,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("policy", &self.policy)
            .field("secret", &"***")
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new(secret: &SecretString, issuer: impl Into<String>, policy: TokenPolicy) -> Self {
        let secret = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_ALGORITHMS.to_vec();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        Self {
            issuer: issuer.into(),
            policy,
            has_secret: !secret.is_empty(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub const fn policy(&self) -> &TokenPolicy {
        &self.policy
    }

    /// Mint a token for `identity` valid from `now` for the policy duration of
    /// `purpose`.
    ///
    /// # Errors
    /// Returns [`TokenError::Signing`] if no secret is configured or signing
    /// fails.
    pub fn issue(
        &self,
        identity: &Identity,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if !self.has_secret {
            return Err(TokenError::Signing("signing secret is empty".to_string()));
        }

        let claims = Claims {
            username: identity.username.clone(),
            full_name: identity.full_name.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: self.policy.expires_at(purpose, now).timestamp(),
            purpose,
            jti: Ulid::new().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify the signature of `token` and return its claims.
    ///
    /// Expiry is not checked.
    ///
    /// # Errors
    /// [`TokenError::Malformed`] if the token cannot be parsed,
    /// [`TokenError::BadSignature`] if no secret is configured, the signature
    /// does not match or the algorithm is not HMAC, [`TokenError::InvalidClaim`]
    /// if the claims do not have the expected shape or issuer.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        if !self.has_secret {
            return Err(TokenError::BadSignature(
                "verification secret is empty".to_string(),
            ));
        }

        let header = decode_header(token).map_err(|e| TokenError::Malformed(e.to_string()))?;
        if !HMAC_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::BadSignature(format!(
                "unexpected signing algorithm: {:?}",
                header.alg
            )));
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature(e.to_string())
                }
                ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
                    TokenError::InvalidClaim(e.to_string())
                }
                _ => TokenError::Malformed(e.to_string()),
            }
        })?;

        if data.claims.iss != self.issuer {
            return Err(TokenError::InvalidClaim(format!(
                "unexpected issuer: {}",
                data.claims.iss
            )));
        }

        Ok(data.claims)
    }

    /// [`Self::validate`] plus a check that the token was minted for `purpose`.
    ///
    /// # Errors
    /// Same as [`Self::validate`], and [`TokenError::InvalidClaim`] on a
    /// purpose mismatch.
    pub fn validate_for(&self, token: &str, purpose: TokenPurpose) -> Result<Claims, TokenError> {
        let claims = self.validate(token)?;

        if claims.purpose != purpose {
            return Err(TokenError::InvalidClaim(format!(
                "expected a {purpose} token, got {}",
                claims.purpose
            )));
        }

        Ok(claims)
    }
}
