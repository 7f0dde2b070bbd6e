//! Identifier types shared by every cardsync crate.

use serde::{Deserialize, Serialize};

/// Session-unique peer number, handed out by the session server on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    /// Raw bytes, used when hashing the id into a tiebreak score.
    pub fn to_le_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// One-byte tag that selects the decoder for an [`Envelope`](crate::Envelope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub u8);

impl EventId {
    /// Marker frame synchronisation (`FrameData`).
    pub const FRAME_SYNC: EventId = EventId(50);

    /// Every id a peer of this protocol version understands.
    pub const REGISTERED: [EventId; 1] = [Self::FRAME_SYNC];

    /// Whether this id belongs to the registry.
    pub fn is_registered(self) -> bool {
        Self::REGISTERED.contains(&self)
    }

    /// Human-readable name for logs.
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::FRAME_SYNC => Some("frame-sync"),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_registry_name() {
        assert_eq!(EventId::FRAME_SYNC.to_string(), "50 (frame-sync)");
        assert_eq!(EventId(9).to_string(), "9");
        assert_eq!(PeerId(3).to_string(), "peer#3");
    }
}
