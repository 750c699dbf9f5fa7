//! Bearer token validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. empty token
//! 2. structure and header algorithm (only asymmetric signature algorithms)
//! 3. key resolution and signature
//! 4. expiry (and `nbf`, when present)
//! 5. issuer, exact match
//! 6. audience, string or array membership
//!
//! On success the complete [`ClaimSet`] is returned; on failure only the error.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, TokenData, Validation};
use tracing::debug;

use super::AuthError;
use super::claims::ClaimSet;
use super::jwks::{KeyFamily, KeySource};

/// Claim checks applied after the signature is verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    /// Reject tokens without an `exp` claim
    pub require_expiry: bool,
    /// Clock skew tolerated on `exp` and `nbf`
    pub leeway: Duration,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            require_expiry: true,
            leeway: Duration::ZERO,
        }
    }
}

/// Expected token issuer and audience, plus the claim policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Expected `iss`, compared byte for byte
    pub issuer: String,
    /// Expected member of `aud`
    pub audience: String,
    /// Claim policy
    pub policy: ValidationPolicy,
}

/// Verifies bearer tokens against a [`KeySource`].
pub struct TokenValidator {
    keys: Arc<KeySource>,
    config: ValidatorConfig,
}

impl TokenValidator {
    /// Create a validator.
    pub fn new(keys: Arc<KeySource>, config: ValidatorConfig) -> Self {
        Self { keys, config }
    }

    /// The key source backing this validator
    #[must_use]
    pub fn key_source(&self) -> &Arc<KeySource> {
        &self.keys
    }

    /// Validate a bearer token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] of the first check that failed.
    pub async fn validate(&self, token: &str) -> Result<ClaimSet, AuthError> {
        if token.is_empty() {
            return Err(AuthError::EmptyToken);
        }

        let (alg, kid) = parse_structure(token)?;

        let kid = kid.ok_or_else(|| {
            AuthError::SignatureVerificationFailed("token header has no kid".to_string())
        })?;
        let key = self
            .keys
            .resolve(&kid)
            .await
            .map_err(|e| AuthError::SignatureVerificationFailed(e.to_string()))?;
        if !key.supports(alg) {
            return Err(AuthError::SignatureVerificationFailed(format!(
                "algorithm {alg:?} does not match key {kid}"
            )));
        }

        let token_data: TokenData<ClaimSet> =
            jsonwebtoken::decode(token, key.decoding_key(), &signature_only(alg))
                .map_err(classify_decode_error)?;
        let claims = token_data.claims;

        self.check_claims(&claims, Utc::now())?;

        debug!(kid = %kid, alg = ?alg, "Token validated");
        Ok(claims)
    }

    /// Time, issuer and audience checks on verified claims.
    fn check_claims(&self, claims: &ClaimSet, now: DateTime<Utc>) -> Result<(), AuthError> {
        let now = now.timestamp();
        let leeway = i64::try_from(self.config.policy.leeway.as_secs()).unwrap_or(i64::MAX);

        match claims.expires_at {
            Some(exp) if now > exp.saturating_add(leeway) => {
                return Err(AuthError::TokenExpired {
                    expired_at: DateTime::from_timestamp(exp, 0).unwrap_or_default(),
                });
            }
            Some(_) => {}
            None if self.config.policy.require_expiry => return Err(AuthError::MissingExpiry),
            None => {}
        }

        if let Some(nbf) = claims.not_before {
            if now < nbf.saturating_sub(leeway) {
                return Err(AuthError::TokenNotYetValid);
            }
        }

        if claims.issuer.as_deref() != Some(self.config.issuer.as_str()) {
            return Err(AuthError::InvalidIssuer);
        }

        if !claims
            .audience
            .as_ref()
            .is_some_and(|aud| aud.contains(&self.config.audience))
        {
            return Err(AuthError::InvalidAudience);
        }

        Ok(())
    }
}

/// Check the three-segment shape, the header and the payload, returning the
/// header algorithm and key ID.
fn parse_structure(token: &str) -> Result<(Algorithm, Option<String>), AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(AuthError::MalformedToken(format!(
            "expected 3 non-empty segments, got {}",
            segments.len()
        )));
    }

    let header = jsonwebtoken::decode_header(token)
        .map_err(|e| AuthError::MalformedToken(format!("invalid header: {e}")))?;

    let payload = URL_SAFE_NO_PAD
        .decode(segments[1])
        .map_err(|e| AuthError::MalformedToken(format!("payload is not base64url: {e}")))?;
    serde_json::from_slice::<ClaimSet>(&payload)
        .map_err(|e| AuthError::MalformedToken(format!("invalid payload: {e}")))?;

    if KeyFamily::for_algorithm(header.alg).is_none() {
        return Err(AuthError::MalformedToken(format!(
            "algorithm {:?} is not accepted",
            header.alg
        )));
    }

    Ok((header.alg, header.kid))
}

/// Signature verification only; claim checks are done by `check_claims`.
fn signature_only(alg: Algorithm) -> Validation {
    let mut validation = Validation::new(alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

fn classify_decode_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::InvalidToken => {
            AuthError::MalformedToken(err.to_string())
        }
        _ => AuthError::SignatureVerificationFailed(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Audience;
    use crate::auth::jwks::KeySet;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::{Map, json};

    const ISSUER: &str = "https://tenant.example/";
    const AUDIENCE: &str = "https://api.example.com";

    fn validator(policy: ValidationPolicy) -> TokenValidator {
        let keys = KeySet::from_jwks(&json!({ "keys": [{
            "kty": "EC", "kid": "ec-1", "crv": "P-256",
            "x": "zThGIhgJ9RO9PEQi9u-TsdJKDLue-nFKZ6nYM-YUIyU",
            "y": "GxhNaSyrM42APpVkusZttkLpbGDg4RzSXZcgR13f_0o"
        }]}))
        .unwrap();
        TokenValidator::new(
            Arc::new(KeySource::preloaded(keys, Duration::from_secs(3600))),
            ValidatorConfig {
                issuer: ISSUER.to_string(),
                audience: AUDIENCE.to_string(),
                policy,
            },
        )
    }

    fn claims(exp: Option<i64>) -> ClaimSet {
        ClaimSet {
            subject: Some("u1".to_string()),
            issuer: Some(ISSUER.to_string()),
            audience: Some(Audience::Single(AUDIENCE.to_string())),
            expires_at: exp,
            issued_at: None,
            not_before: None,
            extra: Map::new(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_token_is_rejected_first() {
        let err = validator(ValidationPolicy::default()).validate("").await.unwrap_err();
        assert!(matches!(err, AuthError::EmptyToken));
    }

    #[tokio::test]
    async fn wrong_segment_count_is_malformed() {
        let v = validator(ValidationPolicy::default());
        for token in ["abc", "a.b", "a.b.c.d", "a..c"] {
            let err = v.validate(token).await.unwrap_err();
            assert!(matches!(err, AuthError::MalformedToken(_)), "{token}: {err:?}");
        }
    }

    #[tokio::test]
    async fn symmetric_algorithm_is_malformed() {
        let token = jsonwebtoken::encode(
            &Header {
                kid: Some("ec-1".to_string()),
                ..Header::new(Algorithm::HS256)
            },
            &json!({ "sub": "u1", "iss": ISSUER, "aud": AUDIENCE, "exp": 4_000_000_000_i64 }),
            &EncodingKey::from_secret(b"shared-secret"),
        )
        .unwrap();

        let err = validator(ValidationPolicy::default()).validate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unsigned_token_is_malformed() {
        // {"alg":"none","typ":"JWT"} . {"sub":"u1"} . (empty signature)
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJzdWIiOiJ1MSJ9.c2ln";
        let err = validator(ValidationPolicy::default()).validate(token).await.unwrap_err();
        assert!(matches!(err, AuthError::MalformedToken(_)), "{err:?}");
    }

    #[test]
    fn accepts_current_claims() {
        let v = validator(ValidationPolicy::default());
        assert!(v.check_claims(&claims(Some(2_000)), at(1_000)).is_ok());
        // expiry instant itself is still valid
        assert!(v.check_claims(&claims(Some(1_000)), at(1_000)).is_ok());
    }

    #[test]
    fn expired_token_is_rejected() {
        let v = validator(ValidationPolicy::default());
        let err = v.check_claims(&claims(Some(999)), at(1_000)).unwrap_err();
        assert!(matches!(err, AuthError::TokenExpired { expired_at } if expired_at == at(999)));
    }

    #[test]
    fn leeway_extends_expiry() {
        let v = validator(ValidationPolicy {
            require_expiry: true,
            leeway: Duration::from_secs(30),
        });
        assert!(v.check_claims(&claims(Some(980)), at(1_000)).is_ok());
        assert!(v.check_claims(&claims(Some(960)), at(1_000)).is_err());
    }

    #[test]
    fn missing_expiry_follows_policy() {
        let strict = validator(ValidationPolicy::default());
        assert!(matches!(
            strict.check_claims(&claims(None), at(1_000)),
            Err(AuthError::MissingExpiry)
        ));

        let lenient = validator(ValidationPolicy {
            require_expiry: false,
            leeway: Duration::ZERO,
        });
        assert!(lenient.check_claims(&claims(None), at(1_000)).is_ok());
    }

    #[test]
    fn future_not_before_is_rejected() {
        let v = validator(ValidationPolicy::default());
        let mut c = claims(Some(5_000));
        c.not_before = Some(1_500);
        assert!(matches!(v.check_claims(&c, at(1_000)), Err(AuthError::TokenNotYetValid)));
        assert!(v.check_claims(&c, at(1_500)).is_ok());
    }

    #[test]
    fn issuer_must_match_exactly() {
        let v = validator(ValidationPolicy::default());

        let mut c = claims(Some(2_000));
        c.issuer = Some("https://tenant.example".to_string());
        assert!(matches!(v.check_claims(&c, at(1_000)), Err(AuthError::InvalidIssuer)));

        c.issuer = None;
        assert!(matches!(v.check_claims(&c, at(1_000)), Err(AuthError::InvalidIssuer)));
    }

    #[test]
    fn audience_string_or_set() {
        let v = validator(ValidationPolicy::default());

        let mut c = claims(Some(2_000));
        c.audience = Some(Audience::Set(vec![
            "https://tenant.example/userinfo".to_string(),
            AUDIENCE.to_string(),
        ]));
        assert!(v.check_claims(&c, at(1_000)).is_ok());

        c.audience = Some(Audience::Single("https://other.example".to_string()));
        assert!(matches!(v.check_claims(&c, at(1_000)), Err(AuthError::InvalidAudience)));

        c.audience = None;
        assert!(matches!(v.check_claims(&c, at(1_000)), Err(AuthError::InvalidAudience)));
    }

    #[test]
    fn expiry_is_checked_before_issuer() {
        let v = validator(ValidationPolicy::default());
        let mut c = claims(Some(10));
        c.issuer = Some("https://evil.example/".to_string());
        assert!(matches!(
            v.check_claims(&c, at(1_000)),
            Err(AuthError::TokenExpired { .. })
        ));
    }
}
