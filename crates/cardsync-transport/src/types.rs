//! Delivery policy types and the broadcast contract.

use bytes::Bytes;
use cardsync_protocol::{DecodeError, Envelope, PeerId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Delivery guarantee requested for a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reliability {
    /// Delivered once to every reachable target.
    Reliable,
    /// May be dropped or duplicated on the way to remote peers.
    #[default]
    Unreliable,
}

/// Which peers receive a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Every session member, the sender included (local echo).
    #[default]
    All,
    /// Every session member except the sender.
    OthersOnly,
}

/// Connection lifecycle of one peer, as seen by that peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection to the session server.
    Disconnected,
    /// Connected to the server but not a member of any session.
    Connected,
    /// Member of the named session.
    InSession(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    pub fn in_session(&self) -> bool {
        matches!(self, ConnectionState::InSession(_))
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connected => write!(f, "Connected"),
            Self::InSession(name) => write!(f, "InSession({})", name),
        }
    }
}

/// One envelope as it arrives in a peer's inbox.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Sending peer (equal to the receiver for local echo).
    pub from: PeerId,
    pub reliability: Reliability,
    /// Encoded envelope bytes.
    pub bytes: Bytes,
}

impl Delivery {
    /// Decode the envelope framing.
    pub fn envelope(&self) -> std::result::Result<Envelope, DecodeError> {
        Envelope::from_bytes(&self.bytes)
    }
}

/// Publish primitive: fan an envelope out to the session.
///
/// Implementations must not block on remote peers and must deliver local echo
/// exactly once under [`Scope::All`].
pub trait Broadcast: Send + Sync {
    fn broadcast(&self, envelope: &Envelope, reliability: Reliability, scope: Scope) -> Result<()>;
}
