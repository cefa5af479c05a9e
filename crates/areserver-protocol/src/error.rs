//! Error types for the protocol layer.
//!
//! Every variant describes a malformed record: the bytes could not be read
//! back into a [`Record`](crate::Record) or [`ClientRecord`](crate::ClientRecord).
//! Callers drop the offending record and keep the connection open.

use crate::Tag;

/// Errors that can occur while encoding or decoding records.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The record starts with a tag outside the fixed enumeration.
    #[error("unknown record tag {0:?}")]
    UnknownTag(String),

    /// The tag is valid, but not in this direction. Clients may only send
    /// `POS`, `LIFE`, `NAME` and `CHAT`.
    #[error("record tag {0} is not accepted here")]
    UnexpectedTag(Tag),

    /// A field ran past the end of the message.
    #[error("truncated {field}: need {need} bytes, got {got}")]
    Truncated {
        field: &'static str,
        need: usize,
        got: usize,
    },

    /// A field was fully present but its contents are invalid
    /// (bad UTF-8, a bool byte other than 0/1, an overlong length prefix).
    #[error("malformed {0}")]
    Malformed(&'static str),

    /// JSON serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// JSON deserialization failed.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
