//! `HuddleServer` builder and accept loops.
//!
//! This is the entry point for running a relay. It ties the layers
//! together: transport → protocol → session/room → relay.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use huddle_transport::{Incoming, TcpTransport, Transport, TransportError, WebSocketTransport};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::handler::handle_connection;
use crate::{HuddleError, Relay, RelayConfig};

/// How long open connections get to wind down once shutdown starts.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Builder for configuring and starting a relay.
///
/// Listener addresses come from the configuration's `[listen]` table
/// unless overridden here.
///
/// # Example
///
/// ```rust,no_run
/// # async fn start() -> Result<(), huddle::HuddleError> {
/// use huddle::prelude::*;
///
/// let server = HuddleServer::builder()
///     .tcp("0.0.0.0:9000")
///     .websocket("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Default)]
pub struct HuddleServerBuilder {
    config: RelayConfig,
    tcp: Option<String>,
    websocket: Option<String>,
}

impl HuddleServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the TCP listener address. An empty string disables it.
    pub fn tcp(mut self, addr: &str) -> Self {
        self.tcp = Some(addr.to_string());
        self
    }

    /// Sets the WebSocket listener address. An empty string disables it.
    pub fn websocket(mut self, addr: &str) -> Self {
        self.websocket = Some(addr.to_string());
        self
    }

    /// Binds the configured listeners.
    ///
    /// # Errors
    /// [`HuddleError::NoListeners`] if both are disabled, or a transport
    /// error if binding fails.
    pub async fn build(mut self) -> Result<HuddleServer, HuddleError> {
        if let Some(addr) = self.tcp.take() {
            self.config.listen.tcp = addr;
        }
        if let Some(addr) = self.websocket.take() {
            self.config.listen.websocket = addr;
        }

        let tcp = match self.config.listen.tcp_addr() {
            Some(addr) => Some(TcpTransport::bind(addr).await?),
            None => None,
        };
        let websocket = match self.config.listen.websocket_addr() {
            Some(addr) => Some(WebSocketTransport::bind(addr).await?),
            None => None,
        };
        if tcp.is_none() && websocket.is_none() {
            return Err(HuddleError::NoListeners);
        }

        Ok(HuddleServer {
            tcp,
            websocket,
            relay: Arc::new(Relay::new(self.config)),
        })
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HuddleServer {
    tcp: Option<TcpTransport>,
    websocket: Option<WebSocketTransport>,
    relay: Arc<Relay>,
}

impl HuddleServer {
    /// Creates a new builder.
    pub fn builder() -> HuddleServerBuilder {
        HuddleServerBuilder::new()
    }

    /// Address of the TCP listener, if enabled.
    pub fn local_tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().and_then(|t| t.local_addr().ok())
    }

    /// Address of the WebSocket listener, if enabled.
    pub fn local_websocket_addr(&self) -> Option<SocketAddr> {
        self.websocket.as_ref().and_then(|t| t.local_addr().ok())
    }

    /// The shared relay, for inspection.
    pub fn relay(&self) -> Arc<Relay> {
        Arc::clone(&self.relay)
    }

    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), HuddleError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until `shutdown` completes, then stops accepting, ends every
    /// connection, and clears the registry.
    ///
    /// Returns only after every connection task has finished, or after
    /// the drain timeout has aborted the stragglers.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), HuddleError> {
        let mut listeners = JoinSet::new();
        if let Some(tcp) = self.tcp {
            let stop = self.relay.subscribe_shutdown();
            listeners.spawn(accept_loop(tcp, Arc::clone(&self.relay), stop));
        }
        if let Some(websocket) = self.websocket {
            let stop = self.relay.subscribe_shutdown();
            listeners.spawn(accept_loop(websocket, Arc::clone(&self.relay), stop));
        }
        tracing::info!("huddle relay running");

        shutdown.await;
        tracing::info!("shutdown requested");
        self.relay.shutdown().await;
        while listeners.join_next().await.is_some() {}
        Ok(())
    }
}

/// Accepts connections from one transport and runs each in its own task.
///
/// The handler tasks belong to this loop. Once `stop` fires it stops
/// accepting and waits for them before returning.
async fn accept_loop<T: Transport>(
    mut transport: T,
    relay: Arc<Relay>,
    mut stop: watch::Receiver<bool>,
) {
    let mut handlers = JoinSet::new();
    loop {
        tokio::select! {
            accepted = transport.accept() => match accepted {
                Ok(incoming) => {
                    handlers.spawn(serve(incoming, Arc::clone(&relay)));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            },
            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = finished {
                    tracing::error!(error = %e, "connection task failed");
                }
            }
            _ = stop.changed() => break,
        }
    }
    drop(transport);

    let drained = tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
        while handlers.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(remaining = handlers.len(), "connections still open after shutdown, aborting");
        handlers.shutdown().await;
    }
}

/// Completes the transport handshake, then hands the connection to the
/// relay.
async fn serve<I: Incoming>(incoming: I, relay: Arc<Relay>) {
    let peer_addr = incoming.peer_addr();

    let mut stop = relay.subscribe_shutdown();
    if relay.is_shutting_down() {
        return;
    }

    let limit = relay.config().upgrade_timeout();
    let established = tokio::select! {
        result = establish(incoming, limit) => result,
        _ = stop.changed() => return,
    };
    let conn = match established {
        Some(Ok(conn)) => conn,
        Some(Err(e)) => {
            tracing::debug!(%peer_addr, error = %e, "connection setup failed");
            return;
        }
        None => {
            tracing::info!(%peer_addr, "connection setup timed out");
            return;
        }
    };

    if let Err(e) = handle_connection(conn, relay).await {
        tracing::debug!(%peer_addr, error = %e, "connection ended with error");
    }
}

/// Runs [`Incoming::establish`], giving up after `limit` if set.
async fn establish<I: Incoming>(
    incoming: I,
    limit: Option<Duration>,
) -> Option<Result<I::Connection, TransportError>> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, incoming.establish()).await.ok(),
        None => Some(incoming.establish().await),
    }
}
