//! Test harness: a table of peers on one loopback hub, driven tick by tick.
//!
//! [`Table::round`] runs one roster refresh on every peer and then one
//! assignment step on every peer, the same order the 500 ms tasks settle
//! into. No wall clock is involved.

use std::sync::Arc;

use cardsync_command::ManualClock;
use cardsync_node::{Peer, PeerConfig, Result};
use cardsync_roles::{Role, SeatLabel};
use cardsync_transport::{LinkConditions, LoopbackHub, DEFAULT_SESSION_CAPACITY};

/// Session every table peer joins.
pub const TABLE_SESSION: &str = "Room 1000";

/// Install a test subscriber once; later calls are no-ops.
pub fn init_logging() {
    let _ = cardsync_logging::try_init("cardsync=debug");
}

pub struct Table {
    pub hub: LoopbackHub,
    pub clock: ManualClock,
    pub peers: Vec<Peer>,
}

impl Table {
    /// `n` default peers in [`TABLE_SESSION`].
    pub fn new(n: usize) -> Result<Self> {
        Self::with(n, LinkConditions::perfect(), |_| PeerConfig::default())
    }

    /// `n` peers with per-index configuration. Every peer shares the
    /// table's manual clock.
    pub fn with(
        n: usize,
        conditions: LinkConditions,
        config: impl Fn(usize) -> PeerConfig,
    ) -> Result<Self> {
        init_logging();
        let hub = LoopbackHub::with_conditions(conditions);
        let clock = ManualClock::new();
        let mut table = Self {
            hub,
            clock,
            peers: Vec::new(),
        };
        for index in 0..n {
            let peer_config = config(index).with_clock(Arc::new(table.clock.clone()));
            table.add(peer_config)?;
        }
        Ok(table)
    }

    /// Connect one more peer and seat it in the session.
    pub fn add(&mut self, config: PeerConfig) -> Result<usize> {
        let index = self.peers.len();
        let (link, inbox) = self.hub.connect(format!("Player{}", 1000 + index));
        if link.join_session(TABLE_SESSION).is_err() {
            link.create_session(TABLE_SESSION, DEFAULT_SESSION_CAPACITY)?;
        }
        self.peers.push(Peer::new(link, inbox, config));
        Ok(index)
    }

    /// One roster refresh on every peer, then one assignment step on every peer.
    pub fn round(&mut self) -> Result<()> {
        for peer in &mut self.peers {
            peer.refresh_roster()?;
        }
        for peer in &mut self.peers {
            peer.assign()?;
        }
        Ok(())
    }

    pub fn rounds(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.round()?;
        }
        Ok(())
    }

    /// Run the reconnect watchdogs on every peer.
    pub fn watch(&mut self) {
        for peer in &mut self.peers {
            peer.watch_connection();
        }
    }

    /// Dispatch every waiting delivery on every peer.
    pub fn pump(&mut self) -> Result<usize> {
        let mut routed = 0;
        for peer in &mut self.peers {
            routed += peer.pump_inbox()?;
        }
        Ok(routed)
    }

    pub fn roles(&self) -> Vec<Role> {
        self.peers.iter().map(Peer::role).collect()
    }

    /// Committed seat labels, sorted.
    pub fn seats(&self) -> Vec<SeatLabel> {
        let mut seats: Vec<SeatLabel> = self
            .roles()
            .into_iter()
            .filter_map(|r| match r {
                Role::Seat(label) => Some(label),
                _ => None,
            })
            .collect();
        seats.sort();
        seats
    }

    /// Published nicknames, in peer order.
    pub fn nicknames(&self) -> Result<Vec<String>> {
        self.peers
            .iter()
            .map(|p| -> Result<String> { Ok(p.link().nickname()?) })
            .collect()
    }
}
