//! Edge Gateway Library
//!
//! Authenticating edge gateway: every request must carry a bearer token
//! issued by the configured identity provider. Verified requests are routed
//! by exact path to a backend service, with the token subject passed on in a
//! trusted header.
//!
//! # Features
//!
//! - **Token validation**: RS/PS/ES/EdDSA signatures checked against the
//!   provider's published key set, plus expiry, issuer and audience
//! - **Key rotation**: cached key set with scheduled background refresh and
//!   on-demand refresh for unknown key IDs
//! - **Static routing**: exact path and method table, origins resolved per request
//! - **Forwarding**: bounded timeout and response size, uniform `502` on
//!   transport failure

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`. `format` is `json` or text.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    }
    .map_err(|e| Error::Internal(format!("failed to install tracing subscriber: {e}")))
}
