/// Public library interface for the browser bridge MCP server
///
/// This module wires the protocol server, the extension socket channel and
/// the request correlator together, and exports the pieces tests and other
/// applications need.

use axum::Router;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

pub mod channel;
pub mod config;
pub mod correlator;
pub mod domain;
pub mod mcp;
pub mod routing;
pub mod tools;

// Re-export public modules and types
pub use channel::CommandChannel;
pub use config::{BridgeConfig, ConfigError};
pub use correlator::{Correlator, CorrelatorConfig, CorrelatorError};
pub use domain::*;
pub use mcp::{McpServer, Monitor, MonitorEvent, StdioProxy};
pub use routing::ResultRouter;
pub use tools::{DispatchError, ToolDispatcher};

/// How long open connections (extension sockets mostly) get to finish after Ctrl-C
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Errors that can occur during server operation
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] mcp::ProxyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The bridge between MCP clients and the browser extension
///
/// Owns both servers: the JSON-RPC protocol server MCP clients call, and the
/// socket server the extension keeps a connection open to.
pub struct BrowserBridge {
    config: BridgeConfig,
    channel: CommandChannel,
    server: Arc<McpServer>,
}

impl BrowserBridge {
    /// Build the bridge from a validated configuration
    ///
    /// Spawns the correlator task, so this must run inside a Tokio runtime.
    pub async fn new(config: BridgeConfig) -> Result<Self, BridgeError> {
        config.validate()?;

        let channel = CommandChannel::new();
        let correlator = Correlator::spawn(config.correlator());
        let monitor = Monitor::new();

        channel
            .on_result(Arc::new(ResultRouter::new(correlator.clone(), monitor.clone())))
            .await;

        let selectors = tools::SelectorStore::new(config.selectors_file.clone());
        let dispatcher = ToolDispatcher::new(channel.clone(), correlator, selectors);
        let server = Arc::new(McpServer::new(dispatcher, monitor, config.server_settings()));

        Ok(Self {
            config,
            channel,
            server,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn server(&self) -> &Arc<McpServer> {
        &self.server
    }

    /// Routes of the protocol server
    pub fn mcp_router(&self) -> Router {
        mcp::router(self.server.clone())
    }

    /// Routes of the extension socket server
    pub fn channel_router(&self) -> Router {
        channel::router(self.channel.clone())
    }

    /// Bind both configured addresses and serve until Ctrl-C
    pub async fn run(self) -> Result<(), BridgeError> {
        let mcp_listener = TcpListener::bind(self.config.mcp.addr()).await?;
        let channel_listener = TcpListener::bind(self.config.channel.addr()).await?;
        self.serve(mcp_listener, channel_listener, shutdown_signal())
            .await
    }

    /// Serve on already bound listeners until `shutdown` completes
    pub async fn serve<F>(
        self,
        mcp_listener: TcpListener,
        channel_listener: TcpListener,
        shutdown: F,
    ) -> Result<(), BridgeError>
    where
        F: Future<Output = ()>,
    {
        info!("MCP server listening on http://{}", mcp_listener.local_addr()?);
        info!("Extension socket listening on ws://{}", channel_listener.local_addr()?);

        let (stop_tx, stop_rx) = watch::channel(false);

        let mcp_task = tokio::spawn(
            axum::serve(mcp_listener, self.mcp_router())
                .with_graceful_shutdown(stopped(stop_rx.clone()))
                .into_future(),
        );
        let channel_task = tokio::spawn(
            axum::serve(channel_listener, self.channel_router())
                .with_graceful_shutdown(stopped(stop_rx))
                .into_future(),
        );

        self.server.set_running(true);
        shutdown.await;
        info!("Shutting down");
        self.server.set_running(false);
        let _ = stop_tx.send(true);
        // Open monitoring streams would otherwise hold their connections for the whole grace period
        self.server.monitor().close();

        for (name, mut task) in [("mcp", mcp_task), ("channel", channel_task)] {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(server = name, error = %e, "Server stopped with error"),
                Ok(Err(e)) => warn!(server = name, error = %e, "Server task failed"),
                Err(_) => {
                    warn!(server = name, "Connections still open after grace period, aborting");
                    task.abort();
                }
            }
        }

        info!("Browser bridge shutdown complete");
        Ok(())
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    // A dropped sender also counts as stop
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
