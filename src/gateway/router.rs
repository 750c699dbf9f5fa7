//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, to_bytes},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handler::RequestHandler;
use super::proxy::{ProxyRequest, ProxyResponse};
use crate::auth::KeySource;

/// Shared application state
pub struct AppState {
    /// Authenticate, route, forward
    pub handler: RequestHandler,
    /// Signing keys, reported by the health endpoint
    pub keys: Arc<KeySource>,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
}

/// Create the router
///
/// Every request except `GET health_path` is handed to the [`RequestHandler`].
pub fn create_router(state: Arc<AppState>, health_path: &str) -> Router {
    let mut router = Router::new();
    if !health_path.is_empty() {
        // Other methods on the health path get the normal authenticated handling
        router = router.route(health_path, get(health_handler).fallback(proxy_handler));
    }

    router
        .fallback(proxy_handler)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

/// GET `health_path` - answered locally, never authenticated or proxied
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let keys = state.keys.snapshot();

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "signing_keys": keys.len(),
        "keys_fetched_at": keys.fetched_at().to_rfc3339(),
    }))
}

/// Everything else: read the body, then authenticate, route and forward
async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match to_bytes(body, state.max_body_size).await {
        Ok(body) => body,
        Err(e) => {
            warn!(
                method = %parts.method,
                path = %parts.uri.path(),
                limit = state.max_body_size,
                error = %e,
                "Failed to read request body"
            );
            return into_response(ProxyResponse::error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload Too Large",
            ));
        }
    };

    let request = ProxyRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_owned),
        headers: parts.headers,
        body,
    };

    into_response(state.handler.handle(request).await)
}

fn into_response(response: ProxyResponse) -> Response {
    let mut out = Response::new(Body::from(response.body));
    *out.status_mut() = response.status;
    *out.headers_mut() = response.headers;
    out
}
