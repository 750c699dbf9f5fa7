//! Configuration management

use std::{env, path::Path, time::Duration};

use axum::http::HeaderName;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::{KeySourceConfig, ValidationPolicy, ValidatorConfig};
use crate::gateway::RouteTable;
use crate::{Error, Result};

/// Prefix for configuration environment variables
pub const ENV_PREFIX: &str = "EDGE_GATEWAY_";

/// Identity provider variables read for compatibility with existing deployments
const LEGACY_AUTH_VARS: [&str; 2] = ["AUTH0_DOMAIN", "AUTH0_AUDIENCE"];

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Environment files to load before processing config.
    /// Paths support ~ expansion. Loaded in order, later files override earlier.
    pub env_files: Vec<String>,
    /// Server configuration
    pub server: ServerConfig,
    /// Token validation configuration
    pub auth: AuthConfig,
    /// Backend forwarding configuration
    pub proxy: ProxyConfig,
    /// Route table
    pub routing: RoutingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum request body size (bytes)
    pub max_body_size: usize,
    /// Unauthenticated health endpoint; empty disables it
    pub health_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_body_size: 10 * 1024 * 1024, // 10MB
            health_path: "/health".to_string(),
        }
    }
}

/// Token validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity provider domain (`tenant.example.com` or a full URL)
    pub domain: String,
    /// Expected token audience
    pub audience: String,
    /// Expected issuer; defaults to `<domain>/`
    pub issuer: Option<String>,
    /// Key set URL; defaults to `<domain>/.well-known/jwks.json`
    pub jwks_url: Option<String>,
    /// Scheduled key set refresh period
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Minimum spacing of refreshes triggered by unknown key IDs
    #[serde(with = "humantime_serde")]
    pub min_refresh_interval: Duration,
    /// Key set fetch timeout
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
    /// Reject tokens without `exp`
    pub require_expiry: bool,
    /// Clock skew tolerance for `exp` and `nbf`
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            audience: String::new(),
            issuer: None,
            jwks_url: None,
            refresh_interval: Duration::from_secs(3600),
            min_refresh_interval: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(10),
            require_expiry: true,
            leeway: Duration::ZERO,
        }
    }
}

impl AuthConfig {
    /// Provider base URL: scheme added when missing, trailing `/` removed.
    pub fn domain_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("https://") || domain.starts_with("http://") {
            domain.to_string()
        } else {
            format!("https://{domain}")
        }
    }

    /// Expected `iss` claim
    pub fn issuer(&self) -> String {
        self.issuer
            .clone()
            .unwrap_or_else(|| format!("{}/", self.domain_url()))
    }

    /// Key set URL
    pub fn jwks_url(&self) -> String {
        self.jwks_url
            .clone()
            .unwrap_or_else(|| format!("{}/.well-known/jwks.json", self.domain_url()))
    }

    /// Settings for the key source
    pub fn key_source(&self) -> KeySourceConfig {
        KeySourceConfig {
            jwks_url: self.jwks_url(),
            fetch_timeout: self.fetch_timeout,
            refresh_interval: self.refresh_interval,
            min_refresh_interval: self.min_refresh_interval,
        }
    }

    /// Settings for the token validator
    pub fn validator(&self) -> ValidatorConfig {
        ValidatorConfig {
            issuer: self.issuer(),
            audience: self.audience.clone(),
            policy: ValidationPolicy {
                require_expiry: self.require_expiry,
                leeway: self.leeway,
            },
        }
    }
}

/// Backend forwarding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Timeout for one backend exchange
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cap on backend response bodies (bytes)
    pub max_response_bytes: usize,
    /// Header carrying the verified principal to backends
    pub trust_header: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_response_bytes: 1024 * 1024, // 1MB
            trust_header: "X-Auth-User-ID".to_string(),
        }
    }
}

impl ProxyConfig {
    /// Parsed trust header name
    pub fn trust_header_name(&self) -> Result<HeaderName> {
        HeaderName::from_bytes(self.trust_header.trim().as_bytes()).map_err(|_| {
            Error::Config(format!(
                "proxy.trust_header '{}' is not a valid header name",
                self.trust_header
            ))
        })
    }
}

/// Route table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Answer disallowed methods with 405 and `Allow` instead of 404
    pub strict_methods: bool,
    /// Routes, matched by exact path
    pub routes: Vec<RouteConfig>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            strict_methods: false,
            routes: default_routes(),
        }
    }
}

/// One route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Exact request path
    pub path: String,
    /// Backend service name
    pub service: String,
    /// Accepted methods
    pub methods: Vec<String>,
    /// Origin URL, or `env:NAME` to read it from the environment per request
    pub origin: String,
}

fn default_routes() -> Vec<RouteConfig> {
    [
        ("account", "ACCOUNT_SERVICE_URL"),
        ("asset", "ASSET_SERVICE_URL"),
        ("balance", "BALANCE_SERVICE_URL"),
    ]
    .into_iter()
    .map(|(service, var)| RouteConfig {
        path: format!("/api/customers/{service}"),
        service: service.to_string(),
        methods: ["GET", "PUT", "DELETE", "POST"].map(String::from).to_vec(),
        origin: format!("env:{var}"),
    })
    .collect()
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// Precedence, lowest first: YAML file, `AUTH0_DOMAIN`/`AUTH0_AUDIENCE`,
    /// `EDGE_GATEWAY_*` variables (`__` separates nested keys).
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment
            .merge(Env::raw().only(&LEGACY_AUTH_VARS).map(|key| {
                if key.as_str().eq_ignore_ascii_case("AUTH0_DOMAIN") {
                    "auth.domain".into()
                } else {
                    "auth.audience".into()
                }
            }))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Load env files into process environment (before env var expansion)
        config.load_env_files();

        config.expand_env_vars();

        Ok(config)
    }

    /// Check the configuration before anything is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.auth.domain.trim().is_empty() {
            return Err(Error::Config(
                "auth.domain is required (or set AUTH0_DOMAIN)".to_string(),
            ));
        }
        if self.auth.audience.trim().is_empty() {
            return Err(Error::Config(
                "auth.audience is required (or set AUTH0_AUDIENCE)".to_string(),
            ));
        }

        for (name, value) in [
            ("auth.refresh_interval", self.auth.refresh_interval),
            ("auth.fetch_timeout", self.auth.fetch_timeout),
            ("proxy.timeout", self.proxy.timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.proxy.max_response_bytes == 0 {
            return Err(Error::Config(
                "proxy.max_response_bytes must be greater than zero".to_string(),
            ));
        }
        if self.server.max_body_size == 0 {
            return Err(Error::Config(
                "server.max_body_size must be greater than zero".to_string(),
            ));
        }

        self.proxy.trust_header_name()?;

        let table = RouteTable::from_config(&self.routing)?;
        let health = self.server.health_path.as_str();
        if !health.is_empty() {
            if !health.starts_with('/') {
                return Err(Error::Config(format!(
                    "server.health_path '{health}' must start with '/'"
                )));
            }
            if health.contains(['{', '}'])
                || health.split('/').any(|segment| segment.starts_with([':', '*']))
            {
                return Err(Error::Config(format!(
                    "server.health_path '{health}' must be a literal path"
                )));
            }
            if table.iter().any(|route| route.path == health) {
                return Err(Error::Config(format!(
                    "server.health_path '{health}' collides with a route"
                )));
            }
        }

        Ok(())
    }

    /// Load environment files into the process environment.
    /// Supports ~ expansion. Files that don't exist are silently skipped.
    fn load_env_files(&self) {
        for path_str in &self.env_files {
            let expanded = if path_str.starts_with('~') {
                if let Some(home) = dirs::home_dir() {
                    path_str.replacen('~', &home.display().to_string(), 1)
                } else {
                    path_str.clone()
                }
            } else {
                path_str.clone()
            };

            let path = Path::new(&expanded);
            if path.exists() {
                match dotenvy::from_path(path) {
                    Ok(()) => {
                        tracing::info!("Loaded env file: {expanded}");
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load env file {expanded}: {e}");
                    }
                }
            } else {
                tracing::debug!("Env file not found (skipped): {expanded}");
            }
        }
    }

    /// Expand ${VAR} and ${VAR:-default} patterns in provider settings and
    /// literal route origins
    fn expand_env_vars(&mut self) {
        // Pattern: ${VAR} or ${VAR:-default}
        let Ok(re) = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") else {
            return;
        };

        self.auth.domain = Self::expand_string(&re, &self.auth.domain);
        self.auth.audience = Self::expand_string(&re, &self.auth.audience);
        for value in [&mut self.auth.issuer, &mut self.auth.jwks_url].into_iter().flatten() {
            *value = Self::expand_string(&re, value);
        }

        for route in &mut self.routing.routes {
            route.origin = Self::expand_string(&re, &route.origin);
        }
    }

    /// Expand environment variables in a string
    fn expand_string(re: &Regex, value: &str) -> String {
        re.replace_all(value, |caps: &regex::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map_or("", |m| m.as_str());
            env::var(var_name).unwrap_or_else(|_| default.to_string())
        })
        .into_owned()
    }
}

/// Custom humantime serde module for Duration
pub mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    /// Seconds, or a string with an `ms`, `s`, `m` or `h` suffix.
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    /// Serialize Duration to human-readable string (e.g., "30s")
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the serializer fails.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize human-readable duration string (e.g., "30s", "5m", "1h", "100ms")
    ///
    /// # Errors
    ///
    /// Returns a deserialization error if the string cannot be parsed as a duration.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => return Ok(Duration::from_secs(secs)),
            Raw::Text(s) => s,
        };
        let s = s.trim();

        let parse = |n: &str| -> Result<u64, D::Error> {
            n.trim().parse::<u64>().map_err(serde::de::Error::custom)
        };
        let scaled = |n: &str, factor: u64| -> Result<Duration, D::Error> {
            parse(n)?
                .checked_mul(factor)
                .map(Duration::from_secs)
                .ok_or_else(|| serde::de::Error::custom("duration out of range"))
        };

        if let Some(ms) = s.strip_suffix("ms") {
            parse(ms).map(Duration::from_millis)
        } else if let Some(secs) = s.strip_suffix('s') {
            parse(secs).map(Duration::from_secs)
        } else if let Some(mins) = s.strip_suffix('m') {
            scaled(mins, 60)
        } else if let Some(hours) = s.strip_suffix('h') {
            scaled(hours, 3600)
        } else {
            // Assume seconds
            parse(s).map(Duration::from_secs)
        }
    }
}
