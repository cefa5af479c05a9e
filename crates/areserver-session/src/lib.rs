//! Connection tracking for Areserver.
//!
//! The registry is the bijection between transport connections and active
//! players: every open connection that has finished connecting owns exactly
//! one uid, and every active uid belongs to exactly one connection.
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)          ← registers on connect, unregisters on disconnect
//!     ↕
//! Session Layer (this crate)  ← ConnectionId ↔ PlayerId
//!     ↕
//! Transport / Protocol (below) ← provide ConnectionId and PlayerId
//! ```

mod error;
mod registry;

pub use error::SessionError;
pub use registry::ConnectionRegistry;
