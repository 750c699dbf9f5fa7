//! Request handling and status mapping
//!
//! [`RequestHandler::handle`] authenticates, routes and forwards one request.
//! [`RequestError::into_response`] is the only place where authentication and
//! routing failures become HTTP statuses.

use axum::http::{
    HeaderValue, StatusCode,
    header::{ALLOW, WWW_AUTHENTICATE},
};
use thiserror::Error;
use tracing::{info, warn};

use super::proxy::{ProxyRequest, ProxyResponse};
use super::routing::{RouteError, ServiceRouter};
use crate::auth::{AuthError, Authenticator};

/// A request that was not forwarded.
#[derive(Debug, Error)]
pub enum RequestError {
    /// Authentication failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Routing failed
    #[error(transparent)]
    Route(#[from] RouteError),
}

impl RequestError {
    /// HTTP status for this failure.
    ///
    /// With `strict_methods`, a disallowed method on a known path is `405`;
    /// otherwise it is indistinguishable from an unknown path.
    #[must_use]
    pub fn status(&self, strict_methods: bool) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Route(RouteError::RouteNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Route(RouteError::MethodNotAllowed { .. }) if strict_methods => {
                StatusCode::METHOD_NOT_ALLOWED
            }
            Self::Route(RouteError::MethodNotAllowed { .. }) => StatusCode::NOT_FOUND,
        }
    }

    /// Client-facing response. Only the status reason goes into the body.
    #[must_use]
    pub fn into_response(self, strict_methods: bool) -> ProxyResponse {
        let status = self.status(strict_methods);
        let mut response = ProxyResponse::error(status, status.canonical_reason().unwrap_or("Error"));

        match self {
            Self::Auth(_) => {
                response
                    .headers
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            Self::Route(RouteError::MethodNotAllowed { allowed, .. }) if strict_methods => {
                let allow = allowed.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers.insert(ALLOW, value);
                }
            }
            Self::Route(_) => {}
        }

        response
    }
}

/// Authenticate, route and forward.
pub struct RequestHandler {
    authenticator: Authenticator,
    router: ServiceRouter,
    strict_methods: bool,
}

impl RequestHandler {
    /// Create a handler.
    pub fn new(authenticator: Authenticator, router: ServiceRouter, strict_methods: bool) -> Self {
        Self {
            authenticator,
            router,
            strict_methods,
        }
    }

    /// Handle one request. Never fails; errors become responses.
    pub async fn handle(&self, request: ProxyRequest) -> ProxyResponse {
        match self.try_handle(&request).await {
            Ok(response) => {
                info!(
                    method = %request.method,
                    path = %request.path,
                    status = response.status.as_u16(),
                    "Request forwarded"
                );
                response
            }
            Err(RequestError::Auth(e)) => {
                warn!(method = %request.method, path = %request.path, error = %e, "Authentication failed");
                RequestError::Auth(e).into_response(self.strict_methods)
            }
            Err(RequestError::Route(e)) => {
                info!(method = %request.method, path = %request.path, error = %e, "Request not routed");
                RequestError::Route(e).into_response(self.strict_methods)
            }
        }
    }

    async fn try_handle(&self, request: &ProxyRequest) -> Result<ProxyResponse, RequestError> {
        let principal = self.authenticator.authenticate(&request.headers).await?;
        Ok(self.router.dispatch(request, &principal).await?)
    }
}
