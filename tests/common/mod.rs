//! Shared fixtures for integration tests
//!
//! Key set endpoints and backends are real axum servers on `127.0.0.1:0`.
//! Tokens are signed with the fixed keys under `tests/fixtures/`.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use edge_gateway::config::Config;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Public modulus of `fixtures/rsa_primary.pem`
pub const RSA_PRIMARY_N: &str = "2viFKDVr1TnPbbPJlHo6YsvXUKxt-Zdfj6ji_e886WrhFieF5Eyd7gCWjkRVP22QCxFWicVJSqvQ3RN9ndKhB_6tRWkV3ehVykSg7vay980O-TTxfyttxI39u3bQE-2BLk1vwHg9QBfzum_vvp64jgImorXF3s7C4JBkMO0o4i3m0RRF3bKTdfuQ-TVp-mZIstHpThwUqOZ_547U4aFazdOttG3IFajZRdmvEkD0sG1TLhINwdZJdHcULJfF9cVkD8NglqMMAOjQlzNItVGrZuuGm9bnDCSCOvWBLglMJ1Liv8kaW5sk702kzKBIGP3enFZlcAuTa1EeIAaDgq4G8Q";
/// Public modulus of `fixtures/rsa_rotated.pem`
pub const RSA_ROTATED_N: &str = "rIpUw7WnJyZTvp8d2fdBcmwu-FUTieAbTVLYIWu_6gQjhsxxFb8On2azHuyl1pgD4zMbQm-0nZaBr5XypXXYmm7YH7gCI6VFN-k0CDrel_DiWo6ytt1UUGwT6xEx6jJefJ0jIWQOSVg0ktU83NSUw5hmNsoyu0UNCTOpsgwk-HoiLGKXVS7esd9g9OXPcaBVapeVuiDNcUSSqFc-owQlnZqpGggAG_NeqzNbm3473fyoMUxO_huIMMwDwkZRttOjBnNcR5ij2Q4hixYNYGBzhbPUix-ecIoYe2djKgH8kxwo_pbCUB55M55_P21sdAub1WtsAVbu1hXYmh5tYr9uMQ";
/// Public point of `fixtures/ec.pem` (P-256)
pub const EC_X: &str = "zThGIhgJ9RO9PEQi9u-TsdJKDLue-nFKZ6nYM-YUIyU";
pub const EC_Y: &str = "GxhNaSyrM42APpVkusZttkLpbGDg4RzSXZcgR13f_0o";

pub const PRIMARY_KID: &str = "primary";
pub const ROTATED_KID: &str = "rotated";
pub const EC_KID: &str = "ec-1";

pub const AUDIENCE: &str = "https://api.example.com";

/// Private signing keys
#[derive(Debug, Clone, Copy)]
pub enum Signer {
    RsaPrimary,
    RsaRotated,
    Ec,
}

impl Signer {
    fn encoding_key(self) -> EncodingKey {
        match self {
            Self::RsaPrimary => EncodingKey::from_rsa_pem(include_bytes!("../fixtures/rsa_primary.pem")).unwrap(),
            Self::RsaRotated => EncodingKey::from_rsa_pem(include_bytes!("../fixtures/rsa_rotated.pem")).unwrap(),
            Self::Ec => EncodingKey::from_ec_pem(include_bytes!("../fixtures/ec.pem")).unwrap(),
        }
    }
}

pub fn rsa_jwk(kid: &str, n: &str) -> Value {
    json!({ "kty": "RSA", "kid": kid, "use": "sig", "alg": "RS256", "n": n, "e": "AQAB" })
}

pub fn ec_jwk(kid: &str) -> Value {
    json!({ "kty": "EC", "kid": kid, "use": "sig", "crv": "P-256", "x": EC_X, "y": EC_Y })
}

pub fn jwks(keys: Vec<Value>) -> Value {
    json!({ "keys": keys })
}

/// Key set with the primary RSA key and the EC key
pub fn default_jwks() -> Value {
    jwks(vec![rsa_jwk(PRIMARY_KID, RSA_PRIMARY_N), ec_jwk(EC_KID)])
}

pub fn now() -> i64 {
    i64::try_from(SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()).unwrap()
}

/// Claims valid for one hour
pub fn claims(issuer: &str, subject: &str) -> Value {
    json!({
        "sub": subject,
        "iss": issuer,
        "aud": AUDIENCE,
        "iat": now(),
        "exp": now() + 3600,
    })
}

pub fn sign(signer: Signer, alg: Algorithm, kid: &str, claims: &Value) -> String {
    let header = Header {
        kid: Some(kid.to_string()),
        ..Header::new(alg)
    };
    jsonwebtoken::encode(&header, claims, &signer.encoding_key()).unwrap()
}

/// RS256 token from the primary key
pub fn token(claims: &Value) -> String {
    sign(Signer::RsaPrimary, Algorithm::RS256, PRIMARY_KID, claims)
}

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// An address nothing listens on
pub async fn closed_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

struct JwksState {
    document: RwLock<Value>,
    status: AtomicU16,
    hits: AtomicUsize,
}

/// Identity provider stand-in serving `/.well-known/jwks.json`
pub struct JwksServer {
    pub base_url: String,
    state: Arc<JwksState>,
}

impl JwksServer {
    pub async fn start(document: Value) -> Self {
        let state = Arc::new(JwksState {
            document: RwLock::new(document),
            status: AtomicU16::new(200),
            hits: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/.well-known/jwks.json", get(serve_jwks))
            .with_state(Arc::clone(&state));

        Self {
            base_url: spawn(app).await,
            state,
        }
    }

    pub fn issuer(&self) -> String {
        format!("{}/", self.base_url)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/.well-known/jwks.json", self.base_url)
    }

    pub fn publish(&self, document: Value) {
        *self.state.document.write() = document;
    }

    pub fn fail_with(&self, status: StatusCode) {
        self.state.status.store(status.as_u16(), Ordering::SeqCst);
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Gateway config pointed at this provider. Unknown-kid refreshes are not
    /// rate limited.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.auth.domain = self.base_url.clone();
        config.auth.audience = AUDIENCE.to_string();
        config.auth.fetch_timeout = Duration::from_secs(2);
        config.auth.min_refresh_interval = Duration::ZERO;
        config.proxy.timeout = Duration::from_secs(2);
        config
    }
}

async fn serve_jwks(State(state): State<Arc<JwksState>>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(state.status.load(Ordering::SeqCst)).unwrap();
    if status == StatusCode::OK {
        Json(state.document.read().clone()).into_response()
    } else {
        (status, "upstream unavailable").into_response()
    }
}

/// A request as seen by a backend
#[derive(Debug, Clone)]
pub struct Received {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Backend that records requests and answers with a fixed status and body
pub struct Backend {
    pub base_url: String,
    received: Arc<Mutex<Vec<Received>>>,
}

impl Backend {
    pub async fn start(status: StatusCode, reply: &'static str) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        let app = Router::new().fallback(move |request: Request| {
            let log = Arc::clone(&log);
            async move {
                let (parts, body) = request.into_parts();
                let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
                log.lock().push(Received {
                    method: parts.method,
                    path: parts.uri.path().to_string(),
                    query: parts.uri.query().map(str::to_owned),
                    headers: parts.headers,
                    body,
                });
                (status, [(CONTENT_TYPE, "text/plain")], reply)
            }
        });

        Self {
            base_url: spawn(app).await,
            received,
        }
    }

    /// Backend answering every request with `router`
    pub async fn custom(app: Router) -> String {
        spawn(app).await
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }
}
