//! Error types for the session layer.

use areserver_protocol::PlayerId;
use areserver_transport::ConnectionId;

/// Errors that can occur while registering or resolving connections.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The connection is already registered. The transport reported the
    /// same connect twice.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    /// The connection was never registered, or has already gone.
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),

    /// No registered connection owns this uid.
    #[error("no connection for player {0}")]
    UnknownPlayer(PlayerId),
}
