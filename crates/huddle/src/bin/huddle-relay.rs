//! huddle relay server
//!
//! # Usage
//!
//! ```bash
//! # Defaults: TCP on 0.0.0.0:9000, WebSocket on 0.0.0.0:3000
//! huddle-relay
//!
//! # From a config file, with the secret from the environment
//! HUDDLE_SECRET=change-me huddle-relay --config /etc/huddle.toml
//!
//! # WebSocket only
//! huddle-relay --tcp "" --websocket 127.0.0.1:8080
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use huddle::{HuddleServer, RelayConfig};

#[derive(Parser, Debug)]
#[command(name = "huddle-relay")]
#[command(about = "Signaling relay for peer-to-peer session setup")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "HUDDLE_CONFIG")]
    config: Option<PathBuf>,

    /// TCP listen address ("" disables)
    #[arg(long, env = "HUDDLE_TCP")]
    tcp: Option<String>,

    /// WebSocket listen address ("" disables)
    #[arg(long, env = "HUDDLE_WEBSOCKET")]
    websocket: Option<String>,

    /// Shared secret for payload obfuscation
    #[arg(long, env = "HUDDLE_SECRET", hide_env_values = true)]
    secret: Option<String>,

    /// Send payloads without obfuscation
    #[arg(long)]
    no_obfuscate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            RelayConfig::load(path)?
        }
        None => RelayConfig::default(),
    };
    if let Some(secret) = args.secret {
        config.secret = secret;
    }
    if args.no_obfuscate {
        config.obfuscate = false;
    }
    if config.secret == huddle::DEFAULT_SECRET && config.obfuscate {
        tracing::warn!("using the built-in default secret; set --secret or HUDDLE_SECRET");
    }

    let mut builder = HuddleServer::builder().config(config);
    if let Some(addr) = &args.tcp {
        builder = builder.tcp(addr);
    }
    if let Some(addr) = &args.websocket {
        builder = builder.websocket(addr);
    }
    let server = builder.build().await?;

    if let Some(addr) = server.local_tcp_addr() {
        info!(%addr, "TCP listener ready");
    }
    if let Some(addr) = server.local_websocket_addr() {
        info!(%addr, "WebSocket listener ready");
    }

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("bye");
    Ok(())
}
