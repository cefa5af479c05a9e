//! # Areserver
//!
//! Authoritative world-state server for a small multiplayer tile world.
//!
//! The server holds the one canonical copy of a 3D tile/wall map and of
//! every connected player's actor (position, name, life). Clients send
//! mutation requests; the server applies them and replicates every accepted
//! change to all connected clients. A newcomer is onboarded with a single
//! batch describing everyone already present and the whole map.
//!
//! ## Layers
//!
//! ```text
//! transport (WebSocket, hub) → dispatcher → world + registry
//!                          ↖ outbox ←───────────┘
//! ```
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use areserver::prelude::*;
//!
//! # async fn start() -> Result<(), ServerError> {
//! let server = Server::builder().bind("0.0.0.0:12345").build().await?;
//! server.run().await
//! # }
//! ```

mod admin;
mod config;
mod dispatcher;
mod error;
mod server;

pub use admin::{read_stdin_commands, AdminCommand, AdminHandle, CommandEntry, COMMANDS};
pub use config::ServerConfig;
pub use dispatcher::Dispatcher;
pub use error::ServerError;
pub use server::{Server, ServerBuilder};

/// Everything needed to embed or test the server.
pub mod prelude {
    pub use crate::{
        AdminCommand, AdminHandle, Dispatcher, Server, ServerBuilder, ServerConfig, ServerError,
    };
    pub use areserver_protocol::{BinaryCodec, ClientRecord, Codec, JsonCodec, PlayerId, Record};
    pub use areserver_tick::{TickConfig, TickPolicy};
    pub use areserver_transport::{ConnectionId, Outbox, TransportEvent};
    pub use areserver_world::{MapConfig, WorldMap, WorldState};
}
