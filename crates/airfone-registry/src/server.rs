//! Registry server.
//!
//! # Rust Learning Note
//!
//! ## Graceful shutdown with a caller-supplied future
//!
//! ```rust,ignore
//! axum::serve(listener, router)
//!     .with_graceful_shutdown(shutdown)
//!     .await?;
//! ```
//!
//! `shutdown` is any `Future<Output = ()>`. The binary passes a signal
//! listener, tests pass a `oneshot::Receiver`. When it resolves, axum stops
//! accepting connections and drains the in-flight requests; only then are
//! the registry's sweep timers cancelled.

use crate::{
    api::create_router, config::ServerConfig, facade::RegistryFacade, registry::Registry,
    transport::TransportConfig, RegistryConfig,
};
use anyhow::{Context, Result};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

#[cfg(unix)]
use tokio::net::UnixListener;

/// HTTP server exposing one registry.
pub struct RegistryServer {
    registry: Arc<Registry>,
    transport: TransportConfig,
    router: Router,
}

impl RegistryServer {
    pub fn new(transport: TransportConfig, config: RegistryConfig) -> Self {
        let registry = Arc::new(Registry::new(config));
        let router = create_router(RegistryFacade::new(Arc::clone(&registry)));

        Self {
            registry,
            transport,
            router,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.server.transport.clone(), config.registry)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Serves until the process is killed.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Binds the configured transport and serves until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        info!("Starting registry server: {}", self.transport.describe());

        match self.transport.clone() {
            TransportConfig::Tcp { port } => {
                let addr = format!("0.0.0.0:{}", port);
                let listener = TcpListener::bind(&addr)
                    .await
                    .with_context(|| format!("Failed to bind {}", addr))?;
                self.serve_tcp(listener, shutdown).await
            }

            #[cfg(unix)]
            TransportConfig::UnixSocket { path } => self.serve_unix(&path, shutdown).await,
        }
    }

    /// Serves on an already bound TCP listener.
    pub async fn serve_tcp<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local = listener.local_addr().context("Failed to read listener address")?;
        info!("Server listening on {}", local);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")?;

        self.registry.shutdown();
        info!("Server on {} stopped", local);
        Ok(())
    }

    /// Serves on a Unix domain socket, replacing a stale socket file.
    #[cfg(unix)]
    pub async fn serve_unix<F>(self, path: &std::path::Path, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
        }

        let listener = UnixListener::bind(path)
            .with_context(|| format!("Failed to bind {}", path.display()))?;
        info!("Server listening on {}", path.display());

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed");

        self.registry.shutdown();
        let _ = std::fs::remove_file(path);
        info!("Server on {} stopped", path.display());
        served
    }
}
