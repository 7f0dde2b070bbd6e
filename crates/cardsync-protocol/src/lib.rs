//! cardsync wire protocol
//!
//! Everything two peers must agree on byte-for-byte lives here: peer
//! identifiers, the closed registry of event ids, the tagged [`Envelope`]
//! that travels over the broadcast channel, and the payloads that ride in it.
//!
//! # Envelope layout
//!
//! ```text
//! ┌──────────┬─────────────────────────────────────────┐
//! │ event id │ bincode(Vec<Field>)                     │
//! │  1 byte  │ ordered primitive / array values        │
//! └──────────┴─────────────────────────────────────────┘
//! ```
//!
//! The event id tells the receiver which decoder to route the fields to. A
//! decoder handed an envelope with someone else's id rejects it with
//! [`DecodeError::EventMismatch`]; the receive path logs and drops it.
//!
//! # Registry
//!
//! | id | payload        | shape                                        |
//! |----|----------------|----------------------------------------------|
//! | 50 | [`FrameData`]  | nick, player id, width, height, ids, corners |
//!
//! Ids are version-stable: a peer never reuses a retired id for a new shape.

mod envelope;
mod error;
mod frame;
mod payload;
mod types;

pub use envelope::{Envelope, Field, FieldReader, MAX_ENVELOPE_SIZE};
pub use error::{DecodeError, Result};
pub use frame::{FrameData, MarkerFrame, MarkerTag, CORNER_VALUES_PER_TAG};
pub use payload::Payload;
pub use types::{EventId, PeerId};
