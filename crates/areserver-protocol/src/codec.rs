//! Codec trait and implementations for whole messages.
//!
//! A message is a run of records. The [`Codec`] trait turns a slice of
//! records into one transport payload and back; the dispatcher doesn't care
//! which implementation it talks to.
//!
//! - [`BinaryCodec`]: the compact tagged-record stream described in
//!   [`crate::wire`]. This is what game clients speak.
//! - [`JsonCodec`]: a JSON array of internally tagged objects. Handy for
//!   poking the server from a browser console.

use bytes::BytesMut;

use crate::{ProtocolError, WireRecord};

/// Encodes and decodes whole messages.
///
/// Decoding is per record: the result holds one entry per record the codec
/// managed to delimit. A malformed record shows up as an `Err` entry so the
/// caller can drop just that record and log it.
pub trait Codec: Send + Sync + 'static {
    /// Serializes `records`, in order, into one message.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Malformed`] if a string field is longer than
    /// [`MAX_STRING_LEN`](crate::MAX_STRING_LEN), or a JSON encode error.
    fn encode<R: WireRecord>(
        &self,
        records: &[R],
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Splits a message back into records.
    fn decode<R: WireRecord>(&self, data: &[u8]) -> Vec<Result<R, ProtocolError>>;

    /// Decodes a message, failing on the first malformed record.
    fn decode_all<R: WireRecord>(
        &self,
        data: &[u8],
    ) -> Result<Vec<R>, ProtocolError> {
        self.decode(data).into_iter().collect()
    }
}

// ---------------------------------------------------------------------------
// BinaryCodec
// ---------------------------------------------------------------------------

/// The binary tagged-record [`Codec`].
///
/// Records have no length prefix of their own, so once one is malformed
/// the position of the next is unknown: decoding yields the records before
/// it, then a single `Err`, then stops.
///
/// ```rust
/// use areserver_protocol::{BinaryCodec, Codec, PlayerId, Record};
///
/// let codec = BinaryCodec;
/// let records = vec![Record::MultiOn, Record::Join { uid: PlayerId(7) }, Record::MultiOff];
///
/// let bytes = codec.encode(&records).unwrap();
/// let decoded: Vec<Record> = codec.decode_all(&bytes).unwrap();
/// assert_eq!(decoded, records);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl Codec for BinaryCodec {
    fn encode<R: WireRecord>(
        &self,
        records: &[R],
    ) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = BytesMut::new();
        for record in records {
            record.write_to(&mut buf)?;
        }
        Ok(buf.to_vec())
    }

    fn decode<R: WireRecord>(&self, data: &[u8]) -> Vec<Result<R, ProtocolError>> {
        let mut cursor = data;
        let mut out = Vec::new();
        while !cursor.is_empty() {
            match R::read_from(&mut cursor) {
                Ok(record) => out.push(Ok(record)),
                Err(e) => {
                    out.push(Err(e));
                    break;
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// A message is a JSON array; each element is one record, e.g.
/// `[{"tag":"POS","x":5,"y":5,"z":1}]`. Elements are decoded one by one,
/// so a bad element doesn't hide the good ones around it.
///
/// This is behind the `json` feature flag (enabled by default).
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<R: WireRecord>(
        &self,
        records: &[R],
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(records).map_err(ProtocolError::Encode)
    }

    fn decode<R: WireRecord>(&self, data: &[u8]) -> Vec<Result<R, ProtocolError>> {
        let elements: Vec<serde_json::Value> = match serde_json::from_slice(data)
        {
            Ok(elements) => elements,
            Err(e) => return vec![Err(ProtocolError::Decode(e))],
        };
        elements
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(ProtocolError::Decode)
            })
            .collect()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClientRecord, PlayerId, Record};

    #[test]
    fn test_binary_empty_message_decodes_to_nothing() {
        let decoded: Vec<Result<Record, _>> = BinaryCodec.decode(&[]);
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_binary_concatenates_records_in_order() {
        let records = vec![
            ClientRecord::Name { name: "Bob".into() },
            ClientRecord::Pos { x: 5, y: 5, z: 1 },
            ClientRecord::Chat { text: "hi".into() },
        ];
        let bytes = BinaryCodec.encode(&records).unwrap();
        let decoded: Vec<ClientRecord> = BinaryCodec.decode_all(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_binary_stops_at_first_malformed_record() {
        let mut bytes = BinaryCodec
            .encode(&[ClientRecord::Life { hp: 50 }])
            .unwrap();
        // An unknown tag, then a record that is never reached.
        bytes.extend_from_slice(b"\x04JUMP");
        bytes.extend_from_slice(
            &BinaryCodec.encode(&[ClientRecord::Life { hp: 60 }]).unwrap(),
        );

        let decoded: Vec<Result<ClientRecord, _>> = BinaryCodec.decode(&bytes);

        assert_eq!(decoded.len(), 2);
        assert_eq!(
            decoded[0].as_ref().unwrap(),
            &ClientRecord::Life { hp: 50 }
        );
        assert!(matches!(decoded[1], Err(ProtocolError::UnknownTag(_))));
    }

    #[test]
    fn test_decode_all_returns_first_error() {
        let result: Result<Vec<Record>, _> = BinaryCodec.decode_all(b"\x02NO");
        assert!(matches!(result, Err(ProtocolError::UnknownTag(_))));
    }

    #[test]
    fn test_json_round_trip() {
        let records = vec![
            Record::MultiOn,
            Record::Name {
                uid: PlayerId(1),
                name: "Bob".into(),
            },
            Record::MultiOff,
        ];
        let bytes = JsonCodec.encode(&records).unwrap();
        let decoded: Vec<Record> = JsonCodec.decode_all(&bytes).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_json_bad_element_keeps_neighbours() {
        let json = br#"[
            {"tag": "LIFE", "hp": 10},
            {"tag": "JUMP"},
            {"tag": "CHAT", "text": "still here"}
        ]"#;

        let decoded: Vec<Result<ClientRecord, _>> = JsonCodec.decode(json);

        assert_eq!(decoded.len(), 3);
        assert!(decoded[0].is_ok());
        assert!(matches!(decoded[1], Err(ProtocolError::Decode(_))));
        assert_eq!(
            decoded[2].as_ref().unwrap(),
            &ClientRecord::Chat {
                text: "still here".into()
            }
        );
    }

    #[test]
    fn test_json_garbage_returns_single_error() {
        let decoded: Vec<Result<Record, _>> = JsonCodec.decode(b"not json at all");
        assert_eq!(decoded.len(), 1);
        assert!(decoded[0].is_err());
    }
}
