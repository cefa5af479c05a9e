//! Error types for the world layer.

use areserver_protocol::PlayerId;

/// Errors that can occur while reading or mutating the world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No active player has this uid.
    #[error("player {0} is not active")]
    UnknownPlayer(PlayerId),

    /// A player with this uid is already active.
    #[error("player {0} is already active")]
    DuplicatePlayer(PlayerId),

    /// A map was requested with a zero or oversized dimension.
    #[error("invalid map dimensions {width}x{height}x{depth}")]
    InvalidDimensions {
        width: usize,
        height: usize,
        depth: usize,
    },

    /// A replacement map does not have the shape of the current one.
    #[error("map shape {got:?} does not match {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize, usize),
        got: (usize, usize, usize),
    },
}
