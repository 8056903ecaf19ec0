//! Relay server listener
//!
//! Binds the HTTP listener and serves the viewer routes until shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::capture::FrameSource;
use crate::error::Result;
use crate::media::Transcoder;
use crate::registry::SessionRegistry;
use crate::server::config::ServerConfig;
use crate::server::websocket::{self, AppState};

/// WebSocket relay server
pub struct RelayServer<S: FrameSource, T: Transcoder> {
    config: ServerConfig,
    registry: Arc<SessionRegistry<S, T>>,
}

impl<S: FrameSource, T: Transcoder> RelayServer<S, T> {
    /// Create a new server on top of a registry
    pub fn new(config: ServerConfig, registry: Arc<SessionRegistry<S, T>>) -> Self {
        Self { config, registry }
    }

    /// Get a reference to the session registry
    pub fn registry(&self) -> &Arc<SessionRegistry<S, T>> {
        &self.registry
    }

    /// Routes served by this server
    ///
    /// - `GET /` service banner
    /// - `GET /ws?camera_index=<key>&rtsp=<locator>` viewer socket
    ///
    /// Every route allows any origin.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            session_timeout: self.config.session_timeout,
        };

        Router::new()
            .route("/", get(websocket::index))
            .route("/ws", get(websocket::viewer::<S, T>))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// Every relay session is closed once the listener stops.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(addr = %addr, "Relay server listening");

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        self.registry.shutdown().await;

        if let Err(e) = result {
            tracing::error!(error = %e, "Relay server failed");
            return Err(e.into());
        }

        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
