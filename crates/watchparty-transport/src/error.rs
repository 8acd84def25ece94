use std::io;

/// Errors raised while terminating client connections.
///
/// WebSocket protocol failures are carried as text so that this type
/// does not depend on the `websocket` feature.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listening socket could not be opened.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The OS refused to hand over the next TCP connection.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    /// A TCP client connected but the WebSocket upgrade did not complete.
    #[error("upgrade failed: {0}")]
    UpgradeFailed(String),

    /// The peer went away, or our side already closed the connection.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_bind_error_names_the_address_and_keeps_the_cause() {
        let err = TransportError::Bind {
            addr: "127.0.0.1:80".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("127.0.0.1:80"));
        assert!(err.source().is_some());
    }
}
