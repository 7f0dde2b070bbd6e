//! cardsync Node - the peer runtime
//!
//! Ties the workspace together into a running peer: a [`Peer`] owns its
//! session link, dispatcher, command log, roster cache, role assigner and
//! watchdogs, and [`Peer::run`] drives them on the [`Intervals`] from
//! [`NodeConfig`]:
//!
//! | task       | period | does                                        |
//! |------------|--------|---------------------------------------------|
//! | roster     | 500 ms | refresh the cached roster                   |
//! | assignment | 500 ms | claim, confirm or repair this peer's label  |
//! | reconnect  | 1 s    | reconnect to the server, rejoin the session |
//! | frame sync | 200 ms | broadcast the current marker frame          |
//! | replay     | 20 ms  | fire due entries while a replay is running  |
//!
//! Inbound deliveries are dispatched as they arrive, on the same task.

pub mod config;
mod error;
pub mod lobby;
pub mod markers;
mod peer;

pub use config::{Intervals, NodeConfig};
pub use error::{Error, Result};
pub use peer::{Peer, PeerConfig, PeerControl, PeerEvent};
