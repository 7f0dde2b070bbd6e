//! Tagged envelope and its ordered field list.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};
use crate::types::EventId;

/// Largest envelope accepted on the wire (event id byte included).
pub const MAX_ENVELOPE_SIZE: usize = 64 * 1024;

/// One primitive or array value in an envelope's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field {
    Byte(u8),
    Bool(bool),
    Int(i32),
    Float(f32),
    Text(String),
    IntArray(Vec<i32>),
    FloatArray(Vec<f32>),
}

impl Field {
    /// Type name used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Byte(_) => "byte",
            Field::Bool(_) => "bool",
            Field::Int(_) => "int",
            Field::Float(_) => "float",
            Field::Text(_) => "text",
            Field::IntArray(_) => "int[]",
            Field::FloatArray(_) => "float[]",
        }
    }
}

/// Wire-level payload: an event id plus the fields its decoder expects.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub event_id: EventId,
    pub fields: Vec<Field>,
}

impl Envelope {
    pub fn new(event_id: EventId, fields: Vec<Field>) -> Self {
        Self { event_id, fields }
    }

    /// Encode as `[event id][bincode(fields)]`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(&self.fields)?;
        let size = body.len() + 1;
        if size > MAX_ENVELOPE_SIZE {
            return Err(DecodeError::TooLarge {
                size,
                limit: MAX_ENVELOPE_SIZE,
            });
        }

        let mut buf = Vec::with_capacity(size);
        buf.push(self.event_id.0);
        buf.extend_from_slice(&body);
        Ok(buf)
    }

    /// Decode bytes produced by [`to_bytes`](Self::to_bytes).
    ///
    /// Only the framing is checked here; whether the event id is known is the
    /// receiver's routing decision.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_ENVELOPE_SIZE {
            return Err(DecodeError::TooLarge {
                size: bytes.len(),
                limit: MAX_ENVELOPE_SIZE,
            });
        }
        let (&id, body) = bytes.split_first().ok_or(DecodeError::Truncated)?;
        let fields: Vec<Field> = bincode::deserialize(body)?;
        Ok(Self {
            event_id: EventId(id),
            fields,
        })
    }

    /// Sequential typed reader over the fields.
    pub fn reader(&self) -> FieldReader<'_> {
        FieldReader::new(&self.fields)
    }
}

/// Reads fields in order, checking each one's type.
#[derive(Debug)]
pub struct FieldReader<'a> {
    fields: &'a [Field],
    index: usize,
}

macro_rules! read_as {
    ($name:ident, $variant:ident, $ty:ty, $label:literal) => {
        pub fn $name(&mut self) -> Result<$ty> {
            let index = self.index;
            match self.next_field($label)? {
                Field::$variant(v) => Ok(v.clone()),
                other => Err(DecodeError::FieldType {
                    index,
                    expected: $label,
                    found: other.kind(),
                }),
            }
        }
    };
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a [Field]) -> Self {
        Self { fields, index: 0 }
    }

    fn next_field(&mut self, expected: &'static str) -> Result<&'a Field> {
        let field = self.fields.get(self.index).ok_or(DecodeError::MissingField {
            index: self.index,
            expected,
        })?;
        self.index += 1;
        Ok(field)
    }

    read_as!(byte, Byte, u8, "byte");
    read_as!(boolean, Bool, bool, "bool");
    read_as!(int, Int, i32, "int");
    read_as!(float, Float, f32, "float");
    read_as!(text, Text, String, "text");
    read_as!(int_array, IntArray, Vec<i32>, "int[]");
    read_as!(float_array, FloatArray, Vec<f32>, "float[]");

    /// Number of fields not yet read.
    pub fn remaining(&self) -> usize {
        self.fields.len().saturating_sub(self.index)
    }

    /// Fail if fields are left over; a longer payload means a shape we don't know.
    pub fn finish(self) -> Result<()> {
        if self.remaining() > 0 {
            return Err(DecodeError::Malformed(format!(
                "{} unexpected trailing field(s)",
                self.remaining()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_is_truncated() {
        assert!(matches!(Envelope::from_bytes(&[]), Err(DecodeError::Truncated)));
    }

    #[test]
    fn garbage_body_is_codec_error() {
        let bytes = [50u8, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        assert!(matches!(Envelope::from_bytes(&bytes), Err(DecodeError::Codec(_))));
    }

    #[test]
    fn oversized_envelope_rejected_on_encode() {
        let envelope = Envelope::new(EventId(50), vec![Field::IntArray(vec![0; MAX_ENVELOPE_SIZE])]);
        assert!(matches!(envelope.to_bytes(), Err(DecodeError::TooLarge { .. })));
    }

    #[test]
    fn reader_reports_type_and_position() {
        let fields = vec![Field::Text("nick".into()), Field::Float(1.0)];
        let mut reader = FieldReader::new(&fields);

        assert_eq!(reader.text().unwrap(), "nick");
        let err = reader.int().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::FieldType { index: 1, expected: "int", found: "float" }
        ));
    }

    #[test]
    fn reader_reports_missing_field() {
        let fields = vec![Field::Int(1)];
        let mut reader = FieldReader::new(&fields);
        reader.int().unwrap();
        assert!(matches!(
            reader.text(),
            Err(DecodeError::MissingField { index: 1, expected: "text" })
        ));
    }

    proptest::proptest! {
        // The receive path feeds raw network bytes straight into this.
        #[test]
        fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let _ = Envelope::from_bytes(&bytes);
        }
    }

    #[test]
    fn finish_rejects_trailing_fields() {
        let fields = vec![Field::Int(1), Field::Bool(true)];
        let mut reader = FieldReader::new(&fields);
        reader.int().unwrap();
        assert!(matches!(reader.finish(), Err(DecodeError::Malformed(_))));
    }
}
