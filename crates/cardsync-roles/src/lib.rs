//! cardsync Roles - seat assignment without a coordinator
//!
//! Peers in a session agree on who sits where by publishing a label as their
//! nickname and watching everyone else's. The pieces, each driven by its own
//! periodic task in the peer runtime:
//!
//! - [`RosterCache`]: snapshot of the session roster, refreshed every 500 ms.
//! - [`RoleAssigner`]: claims the first free [`SeatLabel`], settles
//!   collisions by [`claim_priority`], commits after the claim survives a few
//!   fresh snapshots, then keeps the published nickname from drifting.
//! - [`ReconnectWatchdog`]: restores the server connection and the session
//!   for peers with a label.
//! - [`Subject`]: ordered listener list for lifecycle notifications.
//!
//! Convergence is best-effort. With stale snapshots two peers can briefly
//! hold the same label; the pending window and the tiebreak resolve it in the
//! common cases.

mod assign;
mod error;
mod observer;
mod roster;
mod types;
mod watchdog;

pub use assign::{choose_label, claim_priority, AssignmentConfig, RoleAssigner, RoleEvent};
pub use error::{Error, Result};
pub use observer::{Listener, ListenerToken, Subject};
pub use roster::{RosterCache, RosterService, SessionControl};
pub use types::{Endpoint, Role, Seat, SeatLabel, SPECTATOR_NICKNAME};
pub use watchdog::{ReconnectWatchdog, WatchdogAction};
