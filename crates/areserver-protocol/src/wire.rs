//! Byte layout of every record.
//!
//! ```text
//! record := tag fields
//! tag    := string                  ("JOIN", "POS", "MULTI_ON", ...)
//! string := varint(len) utf8[len]   (LEB128, 7 bits per byte)
//! int32  := 4 bytes little-endian
//! uid    := 8 bytes little-endian
//! bool   := 1 byte, 0 or 1
//! ```
//!
//! Reads never panic on short input: every fixed-width read is preceded by
//! a length check that turns into [`ProtocolError::Truncated`].

use bytes::{Buf, BufMut, BytesMut};
use serde::{de::DeserializeOwned, Serialize};

use crate::{ClientRecord, PlayerId, ProtocolError, Record, Tag};

/// Longest string (in bytes) a record may carry. Longer length prefixes
/// are rejected before any allocation.
pub const MAX_STRING_LEN: usize = 1 << 20;

/// A record type with a fixed binary layout.
///
/// Implemented by [`Record`] (server → client) and [`ClientRecord`]
/// (client → server). The serde bounds let [`JsonCodec`](crate::JsonCodec)
/// handle the same types.
pub trait WireRecord: Sized + Serialize + DeserializeOwned {
    /// The tag written in front of the fields.
    fn tag(&self) -> Tag;

    /// Writes the fields that follow the tag.
    fn write_fields(&self, buf: &mut BytesMut) -> Result<(), ProtocolError>;

    /// Reads the fields for an already-parsed tag.
    fn read_fields(tag: Tag, buf: &mut &[u8]) -> Result<Self, ProtocolError>;

    /// Writes the tag and the fields.
    fn write_to(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        put_string(buf, self.tag().as_str())?;
        self.write_fields(buf)
    }

    /// Reads one full record, advancing `buf` past it.
    fn read_from(buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        let raw = get_string(buf, "tag")?;
        let tag = Tag::parse(&raw)?;
        Self::read_fields(tag, buf)
    }
}

impl WireRecord for Record {
    fn tag(&self) -> Tag {
        Record::tag(self)
    }

    fn write_fields(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            Record::Join { uid } | Record::Part { uid } => {
                buf.put_u64_le(uid.0);
            }
            Record::Name { uid, name } => {
                buf.put_u64_le(uid.0);
                put_string(buf, name)?;
            }
            Record::Life { uid, hp } => {
                buf.put_u64_le(uid.0);
                buf.put_i32_le(*hp);
            }
            Record::Pos { uid, x, y, z } => {
                buf.put_u64_le(uid.0);
                buf.put_i32_le(*x);
                buf.put_i32_le(*y);
                buf.put_i32_le(*z);
            }
            Record::Chat { uid, text } => {
                buf.put_u64_le(uid.0);
                put_string(buf, text)?;
            }
            Record::Tile { x, y, z, tile_id } => {
                buf.put_i32_le(*x);
                buf.put_i32_le(*y);
                buf.put_i32_le(*z);
                buf.put_i32_le(*tile_id);
            }
            Record::Wall {
                x,
                y,
                z,
                wall_id,
                is_left_edge,
            } => {
                buf.put_i32_le(*x);
                buf.put_i32_le(*y);
                buf.put_i32_le(*z);
                buf.put_i32_le(*wall_id);
                buf.put_u8(u8::from(*is_left_edge));
            }
            Record::MultiOn | Record::MultiOff => {}
        }
        Ok(())
    }

    fn read_fields(tag: Tag, buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        // Struct literal fields are evaluated in the order written, which
        // is the order they appear on the wire.
        let record = match tag {
            Tag::Join => Record::Join {
                uid: get_uid(buf)?,
            },
            Tag::Part => Record::Part {
                uid: get_uid(buf)?,
            },
            Tag::Name => Record::Name {
                uid: get_uid(buf)?,
                name: get_string(buf, "name")?,
            },
            Tag::Life => Record::Life {
                uid: get_uid(buf)?,
                hp: get_i32(buf, "hp")?,
            },
            Tag::Pos => Record::Pos {
                uid: get_uid(buf)?,
                x: get_i32(buf, "x")?,
                y: get_i32(buf, "y")?,
                z: get_i32(buf, "z")?,
            },
            Tag::Chat => Record::Chat {
                uid: get_uid(buf)?,
                text: get_string(buf, "text")?,
            },
            Tag::Tile => Record::Tile {
                x: get_i32(buf, "x")?,
                y: get_i32(buf, "y")?,
                z: get_i32(buf, "z")?,
                tile_id: get_i32(buf, "tile_id")?,
            },
            Tag::Wall => Record::Wall {
                x: get_i32(buf, "x")?,
                y: get_i32(buf, "y")?,
                z: get_i32(buf, "z")?,
                wall_id: get_i32(buf, "wall_id")?,
                is_left_edge: get_bool(buf, "is_left_edge")?,
            },
            Tag::MultiOn => Record::MultiOn,
            Tag::MultiOff => Record::MultiOff,
        };
        Ok(record)
    }
}

impl WireRecord for ClientRecord {
    fn tag(&self) -> Tag {
        ClientRecord::tag(self)
    }

    fn write_fields(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            ClientRecord::Pos { x, y, z } => {
                buf.put_i32_le(*x);
                buf.put_i32_le(*y);
                buf.put_i32_le(*z);
            }
            ClientRecord::Life { hp } => buf.put_i32_le(*hp),
            ClientRecord::Name { name } => put_string(buf, name)?,
            ClientRecord::Chat { text } => put_string(buf, text)?,
        }
        Ok(())
    }

    fn read_fields(tag: Tag, buf: &mut &[u8]) -> Result<Self, ProtocolError> {
        match tag {
            Tag::Pos => Ok(ClientRecord::Pos {
                x: get_i32(buf, "x")?,
                y: get_i32(buf, "y")?,
                z: get_i32(buf, "z")?,
            }),
            Tag::Life => Ok(ClientRecord::Life {
                hp: get_i32(buf, "hp")?,
            }),
            Tag::Name => Ok(ClientRecord::Name {
                name: get_string(buf, "name")?,
            }),
            Tag::Chat => Ok(ClientRecord::Chat {
                text: get_string(buf, "text")?,
            }),
            other => Err(ProtocolError::UnexpectedTag(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Field primitives
// ---------------------------------------------------------------------------

fn ensure(
    buf: &[u8],
    field: &'static str,
    need: usize,
) -> Result<(), ProtocolError> {
    if buf.len() < need {
        return Err(ProtocolError::Truncated {
            field,
            need,
            got: buf.len(),
        });
    }
    Ok(())
}

fn get_uid(buf: &mut &[u8]) -> Result<PlayerId, ProtocolError> {
    ensure(buf, "uid", 8)?;
    Ok(PlayerId(buf.get_u64_le()))
}

fn get_i32(buf: &mut &[u8], field: &'static str) -> Result<i32, ProtocolError> {
    ensure(buf, field, 4)?;
    Ok(buf.get_i32_le())
}

fn get_bool(
    buf: &mut &[u8],
    field: &'static str,
) -> Result<bool, ProtocolError> {
    ensure(buf, field, 1)?;
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(ProtocolError::Malformed("bool")),
    }
}

fn get_varint(
    buf: &mut &[u8],
    field: &'static str,
) -> Result<usize, ProtocolError> {
    let mut value: u32 = 0;
    for i in 0..5 {
        ensure(buf, field, 1)?;
        let byte = buf.get_u8();
        value |= u32::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(value as usize);
        }
    }
    Err(ProtocolError::Malformed("length prefix"))
}

fn put_varint(buf: &mut BytesMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

fn get_string(
    buf: &mut &[u8],
    field: &'static str,
) -> Result<String, ProtocolError> {
    let len = get_varint(buf, field)?;
    if len > MAX_STRING_LEN {
        return Err(ProtocolError::Malformed("string length"));
    }
    ensure(buf, field, len)?;
    let text = std::str::from_utf8(&buf[..len])
        .map_err(|_| ProtocolError::Malformed("utf-8 string"))?
        .to_owned();
    buf.advance(len);
    Ok(text)
}

fn put_string(buf: &mut BytesMut, text: &str) -> Result<(), ProtocolError> {
    if text.len() > MAX_STRING_LEN {
        return Err(ProtocolError::Malformed("string length"));
    }
    put_varint(buf, text.len() as u32);
    buf.put_slice(text.as_bytes());
    Ok(())
}

// =========================================================================
// Tests
// =========================================================================
