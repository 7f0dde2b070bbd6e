//! Error types for cardsync-transport.

use cardsync_protocol::{DecodeError, PeerId};
use thiserror::Error;

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors raised by the transport and session layer.
///
/// All of these are recoverable by retrying later; callers on periodic paths
/// log them and carry on.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer has no connection to the session server.
    #[error("not connected")]
    Disconnected,

    /// The operation needs session membership.
    #[error("not in a session")]
    NotInSession,

    /// Already a member of a session.
    #[error("already in session {0:?}")]
    AlreadyInSession(String),

    /// No session with this name exists.
    #[error("session {0:?} not found")]
    SessionNotFound(String),

    /// Session is at capacity.
    #[error("session {name:?} is full ({capacity} peers)")]
    SessionFull { name: String, capacity: usize },

    /// A session with this name already exists.
    #[error("session {0:?} already exists")]
    SessionExists(String),

    /// The hub has no record of this peer.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),

    /// The envelope could not be encoded for the wire.
    #[error("encode error: {0}")]
    Encode(#[from] DecodeError),
}
