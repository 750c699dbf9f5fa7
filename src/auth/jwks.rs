//! Signing key set cache.
//!
//! [`KeySource`] mirrors the identity provider's published JWKS document:
//!
//! 1. `initialize` performs one synchronous fetch; the gateway refuses to
//!    start without a usable key set.
//! 2. A background task re-fetches on a fixed interval and swaps the whole
//!    set in one write. A failed refresh keeps the previous set.
//! 3. `resolve` reads the current snapshot. An unknown `kid` triggers a single
//!    refresh (single-flight, rate limited) before failing, so legitimate key
//!    rotation is picked up without waiting for the next scheduled refresh.
//!    The rate limit only counts unknown-kid fetches, so the first one after
//!    startup or a scheduled refresh goes out immediately.
//!
//! Readers clone an `Arc<KeySet>` under a short read lock and never observe a
//! partially updated set.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{AlgorithmParameters, Jwk, KeyAlgorithm, PublicKeyUse},
};
use parking_lot::{Mutex, RwLock};
use reqwest::{StatusCode, header};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Key set errors.
#[derive(Debug, thiserror::Error)]
pub enum KeySourceError {
    /// The key set could not be fetched or contained no usable keys.
    #[error("Signing key set unavailable from {url}: {reason}")]
    KeySetUnavailable {
        /// Key set URL
        url: String,
        /// What went wrong (network, status, payload)
        reason: String,
    },

    /// No key with this `kid` is published, even after a refresh attempt.
    #[error("Unknown key ID: {0}")]
    UnknownKeyId(String),
}

/// Why a key set document, or one key in it, was not usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    /// The document has no `keys` array
    #[error("document has no \"keys\" array")]
    MissingKeys,

    /// None of the published keys survived parsing
    #[error("none of the {0} published keys is a usable signing key")]
    NoUsableKeys(usize),

    /// The entry is not a JWK
    #[error("unparsable JWK: {0}")]
    InvalidJwk(String),

    /// No `kid`, or an empty one
    #[error("missing kid")]
    MissingKid,

    /// `use` is present and not `sig`
    #[error("not a signature key")]
    NotSigningKey,

    /// `kty: oct`
    #[error("symmetric keys are not accepted")]
    SymmetricKey,

    /// Public key parameters could not be decoded
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// `alg` is not an asymmetric signature algorithm
    #[error("alg {0} is not a signature algorithm")]
    UnsupportedAlgorithm(String),

    /// `alg` belongs to another key type
    #[error("alg {alg} does not match key type {family:?}")]
    AlgorithmMismatch {
        /// Declared algorithm
        alg: String,
        /// Key type from `kty`
        family: KeyFamily,
    },
}

/// Key type, used to refuse tokens whose header algorithm does not fit the
/// published key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    /// `kty: RSA` (RS*, PS*)
    Rsa,
    /// `kty: EC` (ES*)
    EllipticCurve,
    /// `kty: OKP` (`EdDSA`)
    OctetKeyPair,
}

impl KeyFamily {
    /// The key family an asymmetric signing algorithm needs.
    ///
    /// Returns `None` for symmetric (HMAC) algorithms, which are never
    /// accepted: a published key set only carries public material.
    #[must_use]
    pub fn for_algorithm(alg: Algorithm) -> Option<Self> {
        match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(Self::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(Self::EllipticCurve),
            Algorithm::EdDSA => Some(Self::OctetKeyPair),
            _ => None,
        }
    }
}

/// Public key material for one `kid`.
#[derive(Clone)]
pub struct VerificationKey {
    kid: String,
    family: KeyFamily,
    algorithm: Option<Algorithm>,
    key: DecodingKey,
}

impl VerificationKey {
    /// Key identifier
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Key family
    #[must_use]
    pub fn family(&self) -> KeyFamily {
        self.family
    }

    /// Whether a token signed with `alg` may be verified with this key.
    ///
    /// The algorithm must belong to the key's family and, when the key set
    /// pins an `alg` for this key, must equal it.
    #[must_use]
    pub fn supports(&self, alg: Algorithm) -> bool {
        KeyFamily::for_algorithm(alg) == Some(self.family)
            && self.algorithm.is_none_or(|pinned| pinned == alg)
    }

    /// Decoding key for signature verification
    #[must_use]
    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("family", &self.family)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// An immutable snapshot of the published keys.
#[derive(Debug, Clone)]
pub struct KeySet {
    keys: HashMap<String, VerificationKey>,
    fetched_at: DateTime<Utc>,
}

impl KeySet {
    /// Build a key set from a JWKS document.
    ///
    /// Keys are parsed one at a time; unusable entries (no `kid`, not a
    /// signing key, symmetric, bad material) are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`KeyParseError::MissingKeys`] or
    /// [`KeyParseError::NoUsableKeys`].
    pub fn from_jwks(document: &Value) -> Result<Self, KeyParseError> {
        let entries = document
            .get("keys")
            .and_then(Value::as_array)
            .ok_or(KeyParseError::MissingKeys)?;

        let mut keys = HashMap::with_capacity(entries.len());
        for entry in entries {
            match parse_key(entry) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), key);
                }
                Err(reason) => {
                    let kid = entry.get("kid").and_then(Value::as_str).unwrap_or("<none>");
                    warn!(kid = %kid, reason = %reason, "Skipping key from key set");
                }
            }
        }

        if keys.is_empty() {
            return Err(KeyParseError::NoUsableKeys(entries.len()));
        }

        Ok(Self {
            keys,
            fetched_at: Utc::now(),
        })
    }

    /// Look up a key by `kid`
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&VerificationKey> {
        self.keys.get(kid)
    }

    /// Number of usable keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty (never true for a fetched set)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// When this snapshot was fetched
    #[must_use]
    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }
}

fn parse_key(entry: &Value) -> Result<VerificationKey, KeyParseError> {
    let jwk: Jwk = serde_json::from_value(entry.clone())
        .map_err(|e| KeyParseError::InvalidJwk(e.to_string()))?;

    let kid = jwk
        .common
        .key_id
        .clone()
        .filter(|kid| !kid.is_empty())
        .ok_or(KeyParseError::MissingKid)?;

    if let Some(key_use) = &jwk.common.public_key_use {
        if !matches!(key_use, PublicKeyUse::Signature) {
            return Err(KeyParseError::NotSigningKey);
        }
    }

    let (family, key) = match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => (
            KeyFamily::Rsa,
            DecodingKey::from_rsa_components(&rsa.n, &rsa.e),
        ),
        AlgorithmParameters::EllipticCurve(ec) => (
            KeyFamily::EllipticCurve,
            DecodingKey::from_ec_components(&ec.x, &ec.y),
        ),
        AlgorithmParameters::OctetKeyPair(okp) => {
            (KeyFamily::OctetKeyPair, DecodingKey::from_ed_components(&okp.x))
        }
        AlgorithmParameters::OctetKey(_) => {
            return Err(KeyParseError::SymmetricKey);
        }
    };
    let key = key.map_err(|e| KeyParseError::InvalidKeyMaterial(e.to_string()))?;

    let algorithm = match &jwk.common.key_algorithm {
        Some(declared) => Some(pinned_algorithm(declared, family)?),
        None => None,
    };

    Ok(VerificationKey {
        kid,
        family,
        algorithm,
        key,
    })
}

fn pinned_algorithm(declared: &KeyAlgorithm, family: KeyFamily) -> Result<Algorithm, KeyParseError> {
    let name = serde_json::to_value(declared)
        .ok()
        .and_then(|v| v.as_str().map(str::to_owned))
        .unwrap_or_else(|| format!("{declared:?}"));

    let algorithm = Algorithm::from_str(&name)
        .map_err(|_| KeyParseError::UnsupportedAlgorithm(name.clone()))?;

    match KeyFamily::for_algorithm(algorithm) {
        Some(declared_family) if declared_family == family => Ok(algorithm),
        Some(_) => Err(KeyParseError::AlgorithmMismatch { alg: name, family }),
        None => Err(KeyParseError::UnsupportedAlgorithm(name)),
    }
}

/// Settings for [`KeySource`].
#[derive(Debug, Clone)]
pub struct KeySourceConfig {
    /// JWKS document URL
    pub jwks_url: String,
    /// Timeout for one fetch
    pub fetch_timeout: Duration,
    /// Scheduled refresh period
    pub refresh_interval: Duration,
    /// Minimum spacing between fetches triggered by unknown key IDs
    pub min_refresh_interval: Duration,
}

/// Shared, refreshable signing key cache.
pub struct KeySource {
    jwks_url: String,
    http: reqwest::Client,
    current: RwLock<Arc<KeySet>>,
    /// Serializes fetches; unknown-kid callers queue here and re-check.
    refresh_lock: tokio::sync::Mutex<()>,
    /// Last fetch triggered by an unknown `kid`; scheduled refreshes do not count.
    last_unknown_kid_fetch: Mutex<Option<Instant>>,
    refresh_interval: Duration,
    min_refresh_interval: Duration,
}

impl KeySource {
    /// Fetch the key set once and build the cache.
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::KeySetUnavailable`] on network failure, a
    /// non-200 response, a malformed payload or a payload without usable keys.
    pub async fn initialize(config: &KeySourceConfig) -> Result<Self, KeySourceError> {
        if !config.jwks_url.starts_with("https://") {
            warn!(url = %config.jwks_url, "Key set URL is not HTTPS");
        }

        let http = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| KeySourceError::KeySetUnavailable {
                url: config.jwks_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let keys = fetch_key_set(&http, &config.jwks_url).await?;
        info!(url = %config.jwks_url, keys = keys.len(), "Loaded signing key set");

        Ok(Self {
            jwks_url: config.jwks_url.clone(),
            http,
            current: RwLock::new(Arc::new(keys)),
            refresh_lock: tokio::sync::Mutex::new(()),
            last_unknown_kid_fetch: Mutex::new(None),
            refresh_interval: config.refresh_interval,
            min_refresh_interval: config.min_refresh_interval,
        })
    }

    /// Key set URL
    #[must_use]
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// The current key set
    #[must_use]
    pub fn snapshot(&self) -> Arc<KeySet> {
        Arc::clone(&self.current.read())
    }

    /// Resolve a key ID to verification material.
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::UnknownKeyId`] if the key is not in the cached
    /// set and a refresh (when allowed) did not publish it either.
    pub async fn resolve(&self, kid: &str) -> Result<VerificationKey, KeySourceError> {
        if let Some(key) = self.snapshot().get(kid) {
            return Ok(key.clone());
        }

        let _guard = self.refresh_lock.lock().await;

        // A queued caller may find the key published by the fetch it waited on.
        if let Some(key) = self.snapshot().get(kid) {
            return Ok(key.clone());
        }

        let last_fetch = *self.last_unknown_kid_fetch.lock();
        let since_last = last_fetch.map(|at| at.elapsed());
        if let Some(since_last) = since_last.filter(|elapsed| *elapsed < self.min_refresh_interval) {
            debug!(
                kid = %kid,
                since_last_ms = since_last.as_millis(),
                "Unknown key ID, refresh rate limited"
            );
            return Err(KeySourceError::UnknownKeyId(kid.to_string()));
        }
        *self.last_unknown_kid_fetch.lock() = Some(Instant::now());

        debug!(kid = %kid, "Key not found in cached key set, refreshing");
        if let Err(e) = self.refresh_locked().await {
            warn!(kid = %kid, error = %e, "Key set refresh for unknown key ID failed");
        }

        self.snapshot()
            .get(kid)
            .cloned()
            .ok_or_else(|| KeySourceError::UnknownKeyId(kid.to_string()))
    }

    /// Re-fetch the key set and swap it in.
    ///
    /// Returns the number of keys in the new set. On failure the cached set is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::KeySetUnavailable`] if the fetch failed.
    pub async fn refresh(&self) -> Result<usize, KeySourceError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<usize, KeySourceError> {
        let keys = fetch_key_set(&self.http, &self.jwks_url).await?;
        let count = keys.len();
        *self.current.write() = Arc::new(keys);

        debug!(url = %self.jwks_url, keys = count, "Refreshed signing key set");
        Ok(count)
    }

    /// Spawn the scheduled refresh loop. It stops when `shutdown` fires.
    pub fn spawn_refresh_task(self: &Arc<Self>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let source = Arc::clone(self);
        let period = source.refresh_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        match source.refresh().await {
                            Ok(keys) => info!(keys = keys, "Scheduled key set refresh complete"),
                            Err(e) => warn!(error = %e, "Scheduled key set refresh failed, keeping cached keys"),
                        }
                    }
                    _ = shutdown.recv() => {
                        break;
                    }
                }
            }

            debug!("Key set refresh task stopped");
        })
    }

    #[cfg(test)]
    pub(crate) fn preloaded(keys: KeySet, min_refresh_interval: Duration) -> Self {
        Self {
            jwks_url: "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
            http: reqwest::Client::new(),
            current: RwLock::new(Arc::new(keys)),
            refresh_lock: tokio::sync::Mutex::new(()),
            last_unknown_kid_fetch: Mutex::new(None),
            refresh_interval: Duration::from_secs(3600),
            min_refresh_interval,
        }
    }
}

async fn fetch_key_set(http: &reqwest::Client, url: &str) -> Result<KeySet, KeySourceError> {
    let unavailable = |reason: String| KeySourceError::KeySetUnavailable {
        url: url.to_string(),
        reason,
    };

    let response = http
        .get(url)
        .header(header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| unavailable(format!("request failed: {e}")))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(unavailable(format!("HTTP {status}")));
    }

    let document: Value = response
        .json()
        .await
        .map_err(|e| unavailable(format!("invalid JSON: {e}")))?;

    KeySet::from_jwks(&document).map_err(|e| unavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // 2048-bit RSA public key (test material only)
    const RSA_N: &str = "2viFKDVr1TnPbbPJlHo6YsvXUKxt-Zdfj6ji_e886WrhFieF5Eyd7gCWjkRVP22QCxFWicVJSqvQ3RN9ndKhB_6tRWkV3ehVykSg7vay980O-TTxfyttxI39u3bQE-2BLk1vwHg9QBfzum_vvp64jgImorXF3s7C4JBkMO0o4i3m0RRF3bKTdfuQ-TVp-mZIstHpThwUqOZ_547U4aFazdOttG3IFajZRdmvEkD0sG1TLhINwdZJdHcULJfF9cVkD8NglqMMAOjQlzNItVGrZuuGm9bnDCSCOvWBLglMJ1Liv8kaW5sk702kzKBIGP3enFZlcAuTa1EeIAaDgq4G8Q";
    const EC_X: &str = "zThGIhgJ9RO9PEQi9u-TsdJKDLue-nFKZ6nYM-YUIyU";
    const EC_Y: &str = "GxhNaSyrM42APpVkusZttkLpbGDg4RzSXZcgR13f_0o";

    fn rsa_jwk(kid: &str) -> Value {
        json!({ "kty": "RSA", "kid": kid, "use": "sig", "alg": "RS256", "n": RSA_N, "e": "AQAB" })
    }

    fn ec_jwk(kid: &str) -> Value {
        json!({ "kty": "EC", "kid": kid, "use": "sig", "crv": "P-256", "x": EC_X, "y": EC_Y })
    }

    #[test]
    fn algorithm_families() {
        assert_eq!(KeyFamily::for_algorithm(Algorithm::RS256), Some(KeyFamily::Rsa));
        assert_eq!(KeyFamily::for_algorithm(Algorithm::PS512), Some(KeyFamily::Rsa));
        assert_eq!(KeyFamily::for_algorithm(Algorithm::ES256), Some(KeyFamily::EllipticCurve));
        assert_eq!(KeyFamily::for_algorithm(Algorithm::EdDSA), Some(KeyFamily::OctetKeyPair));
        assert_eq!(KeyFamily::for_algorithm(Algorithm::HS256), None);
        assert_eq!(KeyFamily::for_algorithm(Algorithm::HS512), None);
    }

    #[test]
    fn parses_rsa_and_ec_keys() {
        let set = KeySet::from_jwks(&json!({ "keys": [rsa_jwk("rsa-1"), ec_jwk("ec-1")] })).unwrap();

        assert_eq!(set.len(), 2);
        let rsa = set.get("rsa-1").unwrap();
        assert_eq!(rsa.family(), KeyFamily::Rsa);
        assert!(rsa.supports(Algorithm::RS256));
        // pinned to RS256 by the key set
        assert!(!rsa.supports(Algorithm::RS512));
        assert!(!rsa.supports(Algorithm::ES256));

        let ec = set.get("ec-1").unwrap();
        assert_eq!(ec.family(), KeyFamily::EllipticCurve);
        assert!(ec.supports(Algorithm::ES256));
        assert!(!ec.supports(Algorithm::RS256));
    }

    #[test]
    fn skips_unusable_keys() {
        let set = KeySet::from_jwks(&json!({ "keys": [
            rsa_jwk("good"),
            { "kty": "oct", "kid": "hmac", "k": "c2VjcmV0" },
            { "kty": "RSA", "use": "sig", "n": RSA_N, "e": "AQAB" },
            { "kty": "RSA", "kid": "enc", "use": "enc", "n": RSA_N, "e": "AQAB" },
            { "kty": "RSA", "kid": "hs-pinned", "alg": "HS256", "n": RSA_N, "e": "AQAB" },
            { "kty": "unknown", "kid": "weird" }
        ]}))
        .unwrap();

        assert_eq!(set.len(), 1);
        assert!(set.get("good").is_some());
        assert!(set.get("hmac").is_none());
        assert!(set.get("enc").is_none());
        assert!(set.get("hs-pinned").is_none());
    }

    #[test]
    fn rejects_documents_without_usable_keys() {
        assert_eq!(KeySet::from_jwks(&json!({})).unwrap_err(), KeyParseError::MissingKeys);
        assert_eq!(
            KeySet::from_jwks(&json!({ "keys": "nope" })).unwrap_err(),
            KeyParseError::MissingKeys
        );
        assert_eq!(
            KeySet::from_jwks(&json!({ "keys": [] })).unwrap_err(),
            KeyParseError::NoUsableKeys(0)
        );
        assert_eq!(
            KeySet::from_jwks(&json!({ "keys": [{ "kty": "oct", "kid": "h", "k": "c2VjcmV0" }] }))
                .unwrap_err(),
            KeyParseError::NoUsableKeys(1)
        );
    }

    #[test]
    fn classifies_unusable_keys() {
        let parse = |entry: Value| parse_key(&entry).unwrap_err();

        assert_eq!(
            parse(json!({ "kty": "oct", "kid": "h", "k": "c2VjcmV0" })),
            KeyParseError::SymmetricKey
        );
        assert_eq!(
            parse(json!({ "kty": "RSA", "use": "sig", "n": RSA_N, "e": "AQAB" })),
            KeyParseError::MissingKid
        );
        assert_eq!(
            parse(json!({ "kty": "RSA", "kid": "enc", "use": "enc", "n": RSA_N, "e": "AQAB" })),
            KeyParseError::NotSigningKey
        );
        assert_eq!(
            parse(json!({ "kty": "RSA", "kid": "hs", "alg": "HS256", "n": RSA_N, "e": "AQAB" })),
            KeyParseError::UnsupportedAlgorithm("HS256".to_string())
        );
        assert_eq!(
            parse(json!({ "kty": "EC", "kid": "ec", "alg": "RS256", "crv": "P-256", "x": EC_X, "y": EC_Y })),
            KeyParseError::AlgorithmMismatch {
                alg: "RS256".to_string(),
                family: KeyFamily::EllipticCurve,
            }
        );
        assert!(matches!(parse(json!({ "kty": "unknown", "kid": "weird" })), KeyParseError::InvalidJwk(_)));
    }

    #[tokio::test]
    async fn resolves_cached_key() {
        let set = KeySet::from_jwks(&json!({ "keys": [rsa_jwk("rsa-1")] })).unwrap();
        let source = KeySource::preloaded(set, Duration::from_secs(3600));

        let key = source.resolve("rsa-1").await.unwrap();
        assert_eq!(key.kid(), "rsa-1");
    }

    #[tokio::test]
    async fn unknown_key_refresh_is_rate_limited_after_the_first() {
        let set = KeySet::from_jwks(&json!({ "keys": [rsa_jwk("rsa-1")] })).unwrap();
        let source = KeySource::preloaded(set, Duration::from_secs(3600));
        assert!(source.last_unknown_kid_fetch.lock().is_none());

        // first miss fetches (and fails: nothing listens on the discard port)
        let err = source.resolve("rotated").await.unwrap_err();
        assert!(matches!(err, KeySourceError::UnknownKeyId(kid) if kid == "rotated"));
        let first = (*source.last_unknown_kid_fetch.lock()).unwrap();

        // second miss is inside the window and does not fetch
        assert!(source.resolve("rotated").await.is_err());
        assert_eq!(*source.last_unknown_kid_fetch.lock(), Some(first));

        // cache untouched
        assert_eq!(source.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn scheduled_refresh_does_not_consume_the_rate_limit() {
        let set = KeySet::from_jwks(&json!({ "keys": [rsa_jwk("rsa-1")] })).unwrap();
        let source = KeySource::preloaded(set, Duration::from_secs(3600));

        assert!(source.refresh().await.is_err());
        assert!(source.last_unknown_kid_fetch.lock().is_none());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cached_keys() {
        let set = KeySet::from_jwks(&json!({ "keys": [rsa_jwk("rsa-1")] })).unwrap();
        let source = KeySource::preloaded(set, Duration::ZERO);

        // nothing listens on the discard port
        assert!(source.refresh().await.is_err());
        assert!(source.resolve("rsa-1").await.is_ok());
        assert!(matches!(
            source.resolve("missing").await,
            Err(KeySourceError::UnknownKeyId(_))
        ));
    }
}
