//! Error types for the edge gateway
//!
//! Request-path failures are classified by the layer that produced them
//! ([`AuthError`](crate::auth::AuthError), [`RouteError`](crate::gateway::RouteError))
//! and turned into HTTP statuses in one place, `gateway::handler`. This type
//! covers startup and operator-facing failures.

use std::io;

use thiserror::Error;

use crate::auth::KeySourceError;

/// Result type alias for the edge gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Edge gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Signing key set could not be loaded
    #[error(transparent)]
    KeySource(#[from] KeySourceError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the gateway must refuse to start because of this error.
    ///
    /// Every variant raised during startup is fatal today; the distinction
    /// matters to the CLI, which reports configuration problems differently
    /// from an unreachable identity provider.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
