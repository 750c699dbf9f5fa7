//! Static path routing
//!
//! The route table maps exact paths to a backend service and the methods it
//! accepts. Origins are looked up when a request is dispatched, not when the
//! table is built, so an origin taken from the environment can change between
//! requests.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;
use tracing::debug;

use super::proxy::{Forwarder, ProxyRequest, ProxyResponse};
use crate::auth::Principal;
use crate::config::{RouteConfig, RoutingConfig};
use crate::{Error, Result};

/// Prefix marking an origin that is read from an environment variable.
const ENV_PREFIX: &str = "env:";

/// Routing failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    /// No route for this path
    #[error("No route for {0}")]
    RouteNotFound(String),

    /// Route exists but does not accept this method
    #[error("Method {method} not allowed for {path}")]
    MethodNotAllowed {
        /// Request path
        path: String,
        /// Rejected method
        method: Method,
        /// Methods the route accepts
        allowed: Vec<Method>,
    },
}

/// Where a route's origin comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginRef {
    /// Fixed URL
    Literal(String),
    /// Name of a variable resolved through an [`OriginSource`]
    Env(String),
}

impl OriginRef {
    /// Parse `env:NAME` or a literal URL.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix(ENV_PREFIX) {
            Some(name) => Self::Env(name.trim().to_string()),
            None => Self::Literal(raw.to_string()),
        }
    }

    /// Resolve to an origin URL. Unset variables resolve to an empty string.
    pub fn resolve(&self, source: &dyn OriginSource) -> String {
        let origin = match self {
            Self::Literal(url) => url.clone(),
            Self::Env(name) => source.lookup(name).unwrap_or_default(),
        };
        origin.trim().trim_end_matches('/').to_string()
    }
}

impl fmt::Display for OriginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(url) => f.write_str(url),
            Self::Env(name) => write!(f, "{ENV_PREFIX}{name}"),
        }
    }
}

/// Variable lookup for `env:` origins.
pub trait OriginSource: Send + Sync {
    /// Current value of `name`, if set.
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads origins from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl OriginSource for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl OriginSource for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// One route table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Exact request path
    pub path: String,
    /// Backend service name, for logs
    pub service: String,
    /// Accepted methods
    pub methods: Vec<Method>,
    /// Backend origin
    pub origin: OriginRef,
}

impl Route {
    fn from_config(config: &RouteConfig) -> Result<Self> {
        if !config.path.starts_with('/') {
            return Err(Error::Config(format!(
                "route path '{}' must start with '/'",
                config.path
            )));
        }
        if config.methods.is_empty() {
            return Err(Error::Config(format!("route '{}' has no methods", config.path)));
        }

        let methods = config
            .methods
            .iter()
            .map(|m| {
                Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).map_err(|_| {
                    Error::Config(format!("route '{}' has invalid method '{m}'", config.path))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            path: config.path.clone(),
            service: config.service.clone(),
            methods,
            origin: OriginRef::parse(&config.origin),
        })
    }
}

/// Exact-match route table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
    /// Paths in configuration order, for listing
    order: Vec<String>,
}

impl RouteTable {
    /// Build the table from configuration.
    pub fn from_config(config: &RoutingConfig) -> Result<Self> {
        let mut table = Self::default();
        for route in &config.routes {
            table.insert(Route::from_config(route)?)?;
        }
        Ok(table)
    }

    /// Add a route.
    pub fn insert(&mut self, route: Route) -> Result<()> {
        if self.routes.contains_key(&route.path) {
            return Err(Error::Config(format!("duplicate route '{}'", route.path)));
        }
        self.order.push(route.path.clone());
        self.routes.insert(route.path.clone(), route);
        Ok(())
    }

    /// Routes in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.order.iter().filter_map(|path| self.routes.get(path))
    }

    /// Number of routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route for `path` and check `method` against it.
    pub fn lookup(&self, path: &str, method: &Method) -> std::result::Result<&Route, RouteError> {
        let route = self
            .routes
            .get(path)
            .ok_or_else(|| RouteError::RouteNotFound(path.to_string()))?;

        if route.methods.contains(method) {
            Ok(route)
        } else {
            Err(RouteError::MethodNotAllowed {
                path: path.to_string(),
                method: method.clone(),
                allowed: route.methods.clone(),
            })
        }
    }
}

/// A routed request's destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    /// Backend service name
    pub service: String,
    /// Origin URL, possibly empty if unconfigured
    pub origin: String,
}

/// Routes requests and hands them to a [`Forwarder`].
pub struct ServiceRouter {
    table: RouteTable,
    origins: Arc<dyn OriginSource>,
    forwarder: Arc<dyn Forwarder>,
}

impl ServiceRouter {
    /// Create a router.
    pub fn new(table: RouteTable, origins: Arc<dyn OriginSource>, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            table,
            origins,
            forwarder,
        }
    }

    /// Resolve `path` and `method` to a backend, reading the origin now.
    pub fn route(&self, path: &str, method: &Method) -> std::result::Result<BackendTarget, RouteError> {
        let route = self.table.lookup(path, method)?;
        Ok(BackendTarget {
            service: route.service.clone(),
            origin: route.origin.resolve(self.origins.as_ref()),
        })
    }

    /// Route an authenticated request and forward it.
    pub async fn dispatch(
        &self,
        request: &ProxyRequest,
        principal: &Principal,
    ) -> std::result::Result<ProxyResponse, RouteError> {
        let target = self.route(&request.path, &request.method)?;
        debug!(
            service = %target.service,
            method = %request.method,
            path = %request.path,
            "Dispatching request"
        );
        Ok(self.forwarder.forward(request, &target.origin, principal).await)
    }
}
