//! Error types for cardsync-roles.

use cardsync_transport::TransportError;
use thiserror::Error;

/// Result type for role and roster operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The session layer refused an operation.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A rejoin was requested before any session name was cached.
    #[error("no session to rejoin")]
    NoSessionToRejoin,
}
