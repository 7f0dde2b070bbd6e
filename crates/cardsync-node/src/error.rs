//! Error types for cardsync-node.

use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] cardsync_transport::TransportError),

    #[error(transparent)]
    Command(#[from] cardsync_command::Error),

    #[error(transparent)]
    Roles(#[from] cardsync_roles::Error),

    /// A configuration variable held an unusable value.
    #[error("invalid {key}: {value:?}")]
    InvalidConfig { key: &'static str, value: String },
}
