//! Error types for cardsync-command.

use cardsync_protocol::DecodeError;
use cardsync_transport::TransportError;
use thiserror::Error;

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by command execution and log persistence.
#[derive(Debug, Error)]
pub enum Error {
    /// An inbound envelope or payload failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The transport refused a send.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Reading or writing a persisted log failed.
    #[error("log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted log body could not be (de)serialized.
    #[error("log codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// The blob does not start with the log magic.
    #[error("not a command log (magic {0:?})")]
    BadMagic([u8; 4]),

    /// The blob was written by an incompatible format version.
    #[error("unsupported command log version {0}")]
    UnsupportedVersion(u16),

    /// `run` was called before any command was set.
    #[error("no current command")]
    NoCurrentCommand,
}
