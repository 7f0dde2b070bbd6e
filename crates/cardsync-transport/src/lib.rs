//! cardsync Transport - broadcast contract and loopback session hub
//!
//! The rest of the workspace only sees the [`Broadcast`] trait: hand it an
//! envelope plus a delivery policy and it fans the envelope out to the
//! session. Delivery is fire-and-forget. Nothing is acknowledged, distinct
//! broadcasts may arrive in any order, and `Unreliable` sends may be lost or
//! duplicated. The one promise is local echo: under [`Scope::All`] the sender
//! always receives its own envelope exactly once.
//!
//! # Loopback hub
//!
//! [`LoopbackHub`] is an in-process session server that implements the
//! contract for tests, demos and single-machine setups:
//!
//! - Peers [`connect`](LoopbackHub::connect) and get a [`PeerLink`] (send side,
//!   session control, roster queries) and an [`Inbox`] (receive side).
//! - Sessions have a name and a capacity; peers create, join, leave and rejoin
//!   them by name.
//! - [`LinkConditions`] inject loss and duplication on unreliable remote
//!   deliveries, seeded for reproducibility.
//! - [`LoopbackHub::sever`] drops a peer's connection the way a network
//!   timeout would, leaving its session membership to be restored by rejoin.

mod conditions;
mod error;
mod hub;
mod types;

pub use conditions::LinkConditions;
pub use error::{Result, TransportError};
pub use hub::{Inbox, LoopbackHub, PeerEntry, PeerLink, SessionInfo, DEFAULT_SESSION_CAPACITY};
pub use types::{Broadcast, ConnectionState, Delivery, Reliability, Scope};
