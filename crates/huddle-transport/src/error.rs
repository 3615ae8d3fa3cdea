/// Errors that can occur in the transport layer.
///
/// Every variant is scoped to a single connection (or a single accept
/// attempt). The server treats all of them as an implicit close of the
/// affected connection and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding a listener failed.
    #[error("bind failed: {0}")]
    BindFailed(#[source] std::io::Error),

    /// Accepting a connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),
}

/// Wraps a foreign error (e.g. a tungstenite error) as an I/O error of the
/// given kind, so every variant carries a uniform source type.
#[cfg(feature = "websocket")]
pub(crate) fn io_error<E>(kind: std::io::ErrorKind, err: E) -> std::io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    std::io::Error::new(kind, err)
}
