//! Unified error type for the Areserver server crate.

use areserver_protocol::ProtocolError;
use areserver_session::SessionError;
use areserver_transport::TransportError;
use areserver_world::WorldError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` conversions let `?` lift layer errors straight into this
/// type inside the dispatcher and the server loop.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or accepting failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A record could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection registry rejected the operation.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The world store rejected the operation.
    #[error(transparent)]
    World(#[from] WorldError),
}

impl ServerError {
    /// Whether this error means the registry and the world store disagree
    /// (or a caller asked about something neither knows).
    pub fn is_desync(&self) -> bool {
        matches!(
            self,
            ServerError::Session(
                SessionError::UnknownConnection(_) | SessionError::UnknownPlayer(_)
            ) | ServerError::World(WorldError::UnknownPlayer(_) | WorldError::DuplicatePlayer(_))
        )
    }
}
