//! Error types for cardsync-protocol.

use thiserror::Error;

use crate::types::EventId;

/// Result type for decoding operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Reasons an envelope or payload could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The envelope was routed to a decoder for a different event.
    #[error("event id {found} does not match decoder for {expected}")]
    EventMismatch { expected: EventId, found: EventId },

    /// No decoder is registered for this event id.
    #[error("unknown event id {0}")]
    UnknownEvent(EventId),

    /// The payload ended before every expected field was read.
    #[error("missing field {index} (expected {expected})")]
    MissingField { index: usize, expected: &'static str },

    /// A field had the wrong primitive type.
    #[error("field {index} is {found}, expected {expected}")]
    FieldType {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },

    /// Fields decoded but their contents are inconsistent.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// Zero-length buffer.
    #[error("envelope is empty")]
    Truncated,

    /// Envelope exceeds the maximum wire size.
    #[error("envelope of {size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },

    /// The field list could not be (de)serialized.
    #[error("field codec error: {0}")]
    Codec(#[from] bincode::Error),
}
