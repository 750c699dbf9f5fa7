//! Request authentication
//!
//! A request is authenticated by extracting the bearer token from the
//! `Authorization` header ([`bearer`]), verifying it against the identity
//! provider's published keys ([`validator`], [`jwks`]) and taking the subject
//! claim as the request principal.

pub mod bearer;
pub mod claims;
pub mod jwks;
pub mod validator;

use std::fmt;

use axum::http::{HeaderMap, header::AUTHORIZATION};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

pub use bearer::extract_bearer;
pub use claims::{Audience, ClaimSet};
pub use jwks::{KeyParseError, KeySet, KeySource, KeySourceConfig, KeySourceError};
pub use validator::{TokenValidator, ValidationPolicy, ValidatorConfig};

/// Authentication failures.
///
/// Every variant becomes `401 Unauthorized` at the HTTP boundary; the variants
/// exist for logs and tests. Messages never include the token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No `Authorization` header, or an empty one
    #[error("Missing authorization header")]
    MissingHeader,

    /// Header is not `Bearer <token>`
    #[error("Authorization header is not a bearer credential")]
    MalformedScheme,

    /// Bearer credential is empty
    #[error("Empty bearer token")]
    EmptyToken,

    /// Token cannot be parsed or uses a rejected algorithm
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// Signing key unknown, or signature does not verify
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// `exp` is in the past
    #[error("Token expired at {expired_at}")]
    TokenExpired {
        /// Expiry claim value
        expired_at: DateTime<Utc>,
    },

    /// `exp` is absent and the policy requires it
    #[error("Token has no expiry claim")]
    MissingExpiry,

    /// `nbf` is in the future
    #[error("Token is not valid yet")]
    TokenNotYetValid,

    /// `iss` does not match the configured issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,

    /// Configured audience is not in `aud`
    #[error("Invalid token audience")]
    InvalidAudience,

    /// `sub` is absent or not a string
    #[error("Token has no subject")]
    MissingSubject,
}

/// The authenticated identity of a request (the token subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(String);

impl Principal {
    /// Wrap an already verified subject.
    pub fn new(subject: impl Into<String>) -> Self {
        Self(subject.into())
    }

    /// Principal identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns request headers into a [`Principal`].
pub struct Authenticator {
    validator: TokenValidator,
}

impl Authenticator {
    /// Create an authenticator around a token validator.
    pub fn new(validator: TokenValidator) -> Self {
        Self { validator }
    }

    /// Authenticate a request by its headers.
    ///
    /// Header lookup is case-insensitive. Errors from extraction and
    /// validation are returned unchanged.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
        let value = value.to_str().map_err(|_| AuthError::MalformedScheme)?;

        let token = extract_bearer(value)?;
        let claims = self.validator.validate(token).await?;

        let subject = claims.subject.ok_or(AuthError::MissingSubject)?;
        debug!(subject = %subject, "Request authenticated");
        Ok(Principal(subject))
    }
}
