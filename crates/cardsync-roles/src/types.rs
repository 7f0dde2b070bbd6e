//! Seat labels and roles.
//!
//! A table has two seats. Each seat has a primary endpoint ("A", the
//! player's headset) and a secondary one ("B", the external camera). Labels
//! are published as the peer's nickname, e.g. `"Player 1A"`.

use serde::{Deserialize, Serialize};

/// Nickname declared by spectators.
pub const SPECTATOR_NICKNAME: &str = "Spectator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Seat {
    One,
    Two,
}

impl Seat {
    /// Scan order.
    pub const ALL: [Seat; 2] = [Seat::One, Seat::Two];

    pub fn number(self) -> u8 {
        match self {
            Seat::One => 1,
            Seat::Two => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    Primary,
    Secondary,
}

impl Endpoint {
    pub fn letter(self) -> char {
        match self {
            Endpoint::Primary => 'A',
            Endpoint::Secondary => 'B',
        }
    }
}

/// One of the four seat sub-roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatLabel {
    pub seat: Seat,
    pub endpoint: Endpoint,
}

impl SeatLabel {
    pub const ALL: [SeatLabel; 4] = [
        SeatLabel::new(Seat::One, Endpoint::Primary),
        SeatLabel::new(Seat::One, Endpoint::Secondary),
        SeatLabel::new(Seat::Two, Endpoint::Primary),
        SeatLabel::new(Seat::Two, Endpoint::Secondary),
    ];

    pub const fn new(seat: Seat, endpoint: Endpoint) -> Self {
        Self { seat, endpoint }
    }

    /// Nickname that declares this label.
    pub fn nickname(self) -> String {
        self.to_string()
    }

    /// The label a nickname declares, if any.
    ///
    /// Matching is by containment, so decorated nicknames still count.
    pub fn parse(nickname: &str) -> Option<SeatLabel> {
        Self::ALL
            .into_iter()
            .find(|label| nickname.contains(&label.nickname()))
    }
}

impl std::fmt::Display for SeatLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}{}", self.seat.number(), self.endpoint.letter())
    }
}

/// This peer's assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Unassigned,
    Seat(SeatLabel),
    Spectator,
}

impl Role {
    pub fn is_assigned(self) -> bool {
        !matches!(self, Role::Unassigned)
    }

    /// Nickname this role is published under.
    pub fn nickname(self) -> Option<String> {
        match self {
            Role::Unassigned => None,
            Role::Seat(label) => Some(label.nickname()),
            Role::Spectator => Some(SPECTATOR_NICKNAME.to_string()),
        }
    }

    /// Whether `nickname` still declares this role.
    pub fn matches_nickname(self, nickname: &str) -> bool {
        self.nickname()
            .is_some_and(|expected| nickname.contains(&expected))
    }

    /// Player number carried in frame payloads: the seat number, `-1` for
    /// spectators and `0` while unassigned.
    pub fn player_number(self) -> i32 {
        match self {
            Role::Unassigned => 0,
            Role::Seat(label) => i32::from(label.seat.number()),
            Role::Spectator => -1,
        }
    }

    /// Role declared by a roster nickname.
    pub fn from_nickname(nickname: &str) -> Role {
        if let Some(label) = SeatLabel::parse(nickname) {
            Role::Seat(label)
        } else if nickname.contains(SPECTATOR_NICKNAME) {
            Role::Spectator
        } else {
            Role::Unassigned
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Unassigned => write!(f, "Unassigned"),
            Role::Seat(label) => write!(f, "{}", label),
            Role::Spectator => write!(f, "{}", SPECTATOR_NICKNAME),
        }
    }
}
