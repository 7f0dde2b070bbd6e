//! Typed payloads that convert to and from envelopes.

use crate::envelope::{Envelope, Field, FieldReader};
use crate::error::{DecodeError, Result};
use crate::types::EventId;

/// A payload with a fixed slot in the event registry.
///
/// Implementors only describe their field order; the envelope id check and
/// trailing-field check are shared.
pub trait Payload: Sized {
    /// Registry id this payload is sent under.
    const EVENT_ID: EventId;

    /// Fields in wire order.
    fn write_fields(&self) -> Vec<Field>;

    /// Read fields in the same order `write_fields` produced them.
    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self>;

    fn to_envelope(&self) -> Envelope {
        Envelope::new(Self::EVENT_ID, self.write_fields())
    }

    fn from_envelope(envelope: &Envelope) -> Result<Self> {
        if envelope.event_id != Self::EVENT_ID {
            return Err(DecodeError::EventMismatch {
                expected: Self::EVENT_ID,
                found: envelope.event_id,
            });
        }
        let mut reader = envelope.reader();
        let payload = Self::read_fields(&mut reader)?;
        reader.finish()?;
        Ok(payload)
    }
}
