/// Main entry point for the browser bridge MCP server
///
/// This file sets up logging, parses command line arguments, and starts either
/// the bridge itself (protocol server plus extension socket) or the stdio proxy
/// that forwards a desktop client's stdin/stdout traffic to a running bridge.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use browser_bridge_mcp::{BridgeConfig, BrowserBridge, StdioProxy};

/// Command line arguments for the browser bridge
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Mode>,

    /// Path to a JSON config file
    /// If not provided, uses the per-user config file when one exists
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Host the protocol server binds to
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port of the protocol server
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Port of the extension socket server
    #[arg(long)]
    ws_port: Option<u16>,

    /// Seconds a tool call waits for the extension
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Saved selector presets file
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose output (implies debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Run the protocol server and the extension socket (default)
    Serve,
    /// Forward stdio JSON-RPC to a running bridge
    Proxy {
        /// Base URL of the bridge; defaults to the configured host and port
        #[arg(long)]
        url: Option<String>,
    },
}

impl Args {
    fn apply(&self, config: &mut BridgeConfig) {
        if let Some(host) = &self.host {
            config.mcp.host = host.clone();
        }
        if let Some(port) = self.port {
            config.mcp.port = port;
        }
        if let Some(port) = self.ws_port {
            config.channel.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
            // Keep the stale sweep clear of calls still inside their timeout
            if config.stale_after_secs <= timeout {
                config.stale_after_secs = timeout.saturating_mul(2);
            }
        }
        if let Some(path) = &self.selectors {
            config.selectors_file = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Set up logging based on command line flags
    let log_level = if args.verbose {
        "debug"
    } else if args.debug {
        "info"
    } else {
        "warn"
    };

    // RUST_LOG wins over the flags when set
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("browser_bridge_mcp={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr) // Send logs to stderr, not stdout
        .init();

    let mut config = BridgeConfig::load_or_default(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    match &args.command {
        Some(Mode::Proxy { url }) => {
            let url = url
                .clone()
                .unwrap_or_else(|| format!("http://{}", config.mcp.addr()));
            info!("Starting stdio proxy for {}", url);

            // Leave the server its own timeout before giving up on the HTTP call
            let timeout = config.request_timeout() + Duration::from_secs(5);
            let proxy = StdioProxy::new(url, timeout)?;
            proxy.run().await?;
        }
        Some(Mode::Serve) | None => {
            info!(
                "Starting browser bridge (protocol {}, extension socket {})",
                config.mcp.addr(),
                config.channel.addr()
            );
            let bridge = BrowserBridge::new(config).await?;
            bridge.run().await?;
        }
    }

    Ok(())
}
