//! Wire protocol for Areserver.
//!
//! This crate defines the records that clients and the server exchange:
//!
//! - **Types** ([`Record`], [`ClientRecord`], [`Tag`], [`PlayerId`]): the
//!   tagged records that travel on the wire.
//! - **Wire format** ([`WireRecord`]): the exact byte layout of every
//!   record field.
//! - **Codec** ([`Codec`] trait, [`BinaryCodec`], [`JsonCodec`]): how a
//!   whole message (a run of records) is turned into bytes and back.
//! - **Errors** ([`ProtocolError`]): what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the dispatcher
//! (world mutations). It knows nothing about connections or players beyond
//! the uid carried inside a record.
//!
//! ```text
//! Transport (bytes) → Protocol (records) → Dispatcher (world state)
//! ```

mod codec;
mod error;
mod types;
mod wire;

pub use codec::{BinaryCodec, Codec};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientRecord, PlayerId, Record, Tag};
pub use wire::{WireRecord, MAX_STRING_LEN};
