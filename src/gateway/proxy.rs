//! Backend forwarding
//!
//! [`Forwarder`] is the seam between routing and I/O: the router hands it the
//! inbound request, the resolved origin and the verified principal, and gets a
//! response back. Forwarding never fails outward; every failure is already a
//! [`ProxyResponse`] with a gateway status code.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{
    HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
    header::{self, CONTENT_TYPE},
};
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, warn};
use url::Url;

use crate::auth::Principal;
use crate::Result;

/// Inbound headers that describe the client hop, not the request.
const HOP_BY_HOP: [HeaderName; 9] = [
    header::HOST,
    header::CONTENT_LENGTH,
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// A request as received from the client, after the body has been read.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method
    pub method: Method,
    /// Request path, without query
    pub path: String,
    /// Raw query string, without `?`
    pub query: Option<String>,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Bytes,
}

impl ProxyRequest {
    /// A bodiless request, mostly for tests and diagnostics.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// The response returned to the client.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl ProxyResponse {
    /// A response with a JSON content type.
    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// A fixed `{"error":"<message>"}` response.
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, json!({ "error": message }).to_string())
    }
}

/// Forwards a routed request to a backend origin.
#[async_trait]
pub trait Forwarder: Send + Sync {
    /// Forward `request` to `origin` on behalf of `principal`.
    async fn forward(&self, request: &ProxyRequest, origin: &str, principal: &Principal) -> ProxyResponse;
}

/// HTTP forwarder with a bounded timeout and response size.
pub struct HttpProxy {
    client: Client,
    trust_header: HeaderName,
    max_response_bytes: usize,
}

impl HttpProxy {
    /// Create a forwarder.
    ///
    /// `timeout` bounds the whole exchange, including reading the body.
    pub fn new(timeout: Duration, trust_header: HeaderName, max_response_bytes: usize) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            trust_header,
            max_response_bytes,
        })
    }

    /// Copy inbound headers minus the hop-by-hop set, then set the trust
    /// header to the principal, replacing any client-supplied value.
    fn outbound_headers(&self, inbound: &HeaderMap, principal: &Principal) -> Option<HeaderMap> {
        let mut headers = inbound.clone();
        for name in &HOP_BY_HOP {
            headers.remove(name);
        }

        let value = HeaderValue::from_str(principal.as_str()).ok()?;
        headers.insert(self.trust_header.clone(), value);
        Some(headers)
    }

    /// Read at most `max_response_bytes` of the body. Overflow and read errors
    /// end the read with whatever arrived so far.
    async fn read_capped(&self, mut response: reqwest::Response, target: &str) -> Bytes {
        let mut body = BytesMut::new();

        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    let room = self.max_response_bytes - body.len();
                    if chunk.len() > room {
                        body.extend_from_slice(&chunk[..room]);
                        warn!(
                            url = %target,
                            limit = self.max_response_bytes,
                            "Backend response exceeded size limit, truncated"
                        );
                        break;
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(url = %target, error = %e, "Failed to read backend response body");
                    break;
                }
            }
        }

        body.freeze()
    }
}

#[async_trait]
impl Forwarder for HttpProxy {
    async fn forward(&self, request: &ProxyRequest, origin: &str, principal: &Principal) -> ProxyResponse {
        let origin = origin.trim().trim_end_matches('/');
        if origin.is_empty() {
            error!(path = %request.path, "Backend service URL not configured");
            return ProxyResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Backend service URL not configured",
            );
        }

        let target = target_url(origin, &request.path, request.query.as_deref());
        let url = match Url::parse(&target) {
            Ok(url) => url,
            Err(e) => {
                error!(url = %target, error = %e, "Invalid backend URL");
                return ProxyResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Proxy Error");
            }
        };

        let Some(headers) = self.outbound_headers(&request.headers, principal) else {
            error!(url = %target, "Principal is not a valid header value");
            return ProxyResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Proxy Error");
        };

        debug!(method = %request.method, url = %target, "Forwarding request");

        let response = match self
            .client
            .request(request.method.clone(), url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    url = %target,
                    timeout = e.is_timeout(),
                    error = %e,
                    "Backend request failed"
                );
                return ProxyResponse::error(StatusCode::BAD_GATEWAY, "Bad Gateway");
            }
        };

        let status = response.status();
        let body = self.read_capped(response, &target).await;
        debug!(url = %target, status = %status, bytes = body.len(), "Backend responded");

        ProxyResponse::json(status, body)
    }
}

/// `origin + path`, plus `?query` when present.
fn target_url(origin: &str, path: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{origin}{path}?{query}"),
        _ => format!("{origin}{path}"),
    }
}
