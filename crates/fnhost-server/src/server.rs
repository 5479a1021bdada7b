//! HTTP server implementation.
//!
//! This module provides the main [`FnHostServer`] struct for serving the
//! HTTP and RPC transports.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use fnhost_common::{RpcConfig, RuntimeError, ServerConfigFile};

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server.
    pub bind_addr: SocketAddr,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Enable graceful shutdown on SIGTERM/SIGINT.
    pub graceful_shutdown: bool,
    /// Prefix for the RPC endpoints; `None` disables them.
    pub rpc_prefix: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080)),
            request_timeout_secs: 30,
            graceful_shutdown: true,
            rpc_prefix: Some("/rpc".to_string()),
        }
    }
}

impl ServerConfig {
    /// Build from the `[server]` and `[rpc]` config file sections.
    pub fn from_file(server: &ServerConfigFile, rpc: &RpcConfig) -> Result<Self, RuntimeError> {
        let bind_addr = server.bind_addr.parse().map_err(|e| {
            RuntimeError::invalid_config(format!("invalid bind_addr '{}': {e}", server.bind_addr))
        })?;

        if rpc.enabled && !rpc.prefix.starts_with('/') {
            return Err(RuntimeError::invalid_config(format!(
                "rpc prefix must start with '/': {}",
                rpc.prefix
            )));
        }

        Ok(Self {
            bind_addr,
            request_timeout_secs: server.request_timeout_secs,
            graceful_shutdown: server.graceful_shutdown,
            rpc_prefix: rpc.enabled.then(|| rpc.prefix.clone()),
        })
    }

    /// Override the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Get the request timeout as Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// fnhost HTTP server.
pub struct FnHostServer {
    state: AppState,
    config: ServerConfig,
}

impl FnHostServer {
    /// Create a server over prepared state.
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self { state, config }
    }

    /// Get a reference to the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Run the server until shutdown.
    ///
    /// With graceful shutdown enabled this returns after SIGTERM/SIGINT once
    /// in-flight requests finish.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let app = build_router(
            self.state,
            self.config.request_timeout(),
            self.config.rpc_prefix.as_deref(),
        );

        let listener = TcpListener::bind(&self.config.bind_addr)
            .await
            .inspect_err(|e| error!(addr = %self.config.bind_addr, error = %e, "Failed to bind"))?;

        info!(
            addr = %self.config.bind_addr,
            rpc = self.config.rpc_prefix.as_deref().unwrap_or("disabled"),
            "Starting HTTP server"
        );

        let serve = axum::serve(listener, app);
        let result = if self.config.graceful_shutdown {
            serve.with_graceful_shutdown(shutdown_signal()).await
        } else {
            serve.await
        };
        result.inspect_err(|e| error!(error = %e, "Server error"))?;

        info!("Server shutdown complete");
        Ok(())
    }

    /// Start the server on an ephemeral port and return a handle for testing.
    pub async fn start_test(state: AppState) -> Result<TestHandle, RuntimeError> {
        let app = build_router(state.clone(), Duration::from_secs(30), Some("/rpc"));

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        Ok(TestHandle {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }
}

/// Handle for a test server instance.
pub struct TestHandle {
    addr: SocketAddr,
    state: AppState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestHandle {
    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server URL.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Shutdown the server gracefully.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
