//! Gateway server

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::handler::RequestHandler;
use super::proxy::HttpProxy;
use super::router::{AppState, create_router};
use super::routing::{OriginSource, ProcessEnv, RouteTable, ServiceRouter};
use crate::auth::{Authenticator, KeySource, TokenValidator};
use crate::config::Config;
use crate::{Error, Result};

/// Edge gateway server
pub struct Gateway {
    /// Configuration
    config: Config,
    /// Signing key cache, refreshed while the server runs
    keys: Arc<KeySource>,
    /// Request pipeline shared by all connections
    state: Arc<AppState>,
}

impl Gateway {
    /// Create a gateway that reads `env:` origins from the process environment.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration or if the signing key set cannot be
    /// loaded; the gateway never starts without keys.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_origin_source(config, Arc::new(ProcessEnv)).await
    }

    /// Create a gateway with a custom origin lookup.
    ///
    /// # Errors
    ///
    /// See [`Gateway::new`].
    pub async fn with_origin_source(config: Config, origins: Arc<dyn OriginSource>) -> Result<Self> {
        config.validate()?;

        let keys = Arc::new(KeySource::initialize(&config.auth.key_source()).await?);
        let authenticator = Authenticator::new(TokenValidator::new(
            Arc::clone(&keys),
            config.auth.validator(),
        ));

        let table = RouteTable::from_config(&config.routing)?;
        for route in table.iter() {
            info!(path = %route.path, service = %route.service, origin = %route.origin, "Registered route");
        }

        let forwarder = HttpProxy::new(
            config.proxy.timeout,
            config.proxy.trust_header_name()?,
            config.proxy.max_response_bytes,
        )?;
        let router = ServiceRouter::new(table, origins, Arc::new(forwarder));

        let state = Arc::new(AppState {
            handler: RequestHandler::new(authenticator, router, config.routing.strict_methods),
            keys: Arc::clone(&keys),
            max_body_size: config.server.max_body_size,
        });

        Ok(Self { config, keys, state })
    }

    /// The HTTP application, without a listener
    pub fn router(&self) -> Router {
        create_router(Arc::clone(&self.state), &self.config.server.health_path)
    }

    /// Run the gateway until Ctrl-C or SIGTERM
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .server
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid host: {e}")))?,
            self.config.server.port,
        );

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on an already bound listener until `shutdown` completes.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, _) = broadcast::channel(1);
        let refresh_task = self.keys.spawn_refresh_task(shutdown_tx.subscribe());

        info!(
            addr = %listener.local_addr()?,
            jwks_url = %self.keys.jwks_url(),
            refresh_interval = ?self.config.auth.refresh_interval,
            "Edge gateway listening"
        );

        let app = self.router();
        let tx = shutdown_tx.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                let _ = tx.send(());
            })
            .await?;

        let _ = shutdown_tx.send(());
        if let Err(e) = refresh_task.await {
            warn!(error = %e, "Key refresh task ended abnormally");
        }

        info!("Gateway shutdown complete");
        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    debug!("Shutdown signal received");
}
