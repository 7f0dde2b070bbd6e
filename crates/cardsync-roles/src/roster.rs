//! Roster access and the periodically refreshed roster cache.

use cardsync_protocol::PeerId;
use cardsync_transport::{ConnectionState, PeerEntry, PeerLink};
use tracing::{debug, trace};

use crate::error::Result;

/// Eventually consistent view of the session's peers and their labels.
pub trait RosterService {
    fn local_id(&self) -> PeerId;

    /// Connected to the server and inside a session.
    fn is_connected(&self) -> bool;

    /// Every other member of the session.
    fn current_peers(&self) -> Result<Vec<PeerEntry>>;

    /// This peer's nickname as the server has it.
    fn local_nickname(&self) -> Result<String>;

    fn session_name(&self) -> Option<String>;

    /// Publish `nickname` as this peer's declared label.
    fn declare(&self, nickname: &str) -> Result<()>;
}

/// Connection recovery operations used by the watchdogs.
pub trait SessionControl {
    fn connection_state(&self) -> ConnectionState;

    fn reconnect(&self) -> Result<()>;

    fn rejoin(&self, session: &str) -> Result<()>;
}

impl RosterService for PeerLink {
    fn local_id(&self) -> PeerId {
        self.id()
    }

    fn is_connected(&self) -> bool {
        self.state().in_session()
    }

    fn current_peers(&self) -> Result<Vec<PeerEntry>> {
        Ok(self.session_peers()?)
    }

    fn local_nickname(&self) -> Result<String> {
        Ok(self.nickname()?)
    }

    fn session_name(&self) -> Option<String> {
        PeerLink::session_name(self)
    }

    fn declare(&self, nickname: &str) -> Result<()> {
        Ok(self.set_nickname(nickname)?)
    }
}

impl SessionControl for PeerLink {
    fn connection_state(&self) -> ConnectionState {
        self.state()
    }

    fn reconnect(&self) -> Result<()> {
        Ok(PeerLink::reconnect(self)?)
    }

    fn rejoin(&self, session: &str) -> Result<()> {
        Ok(self.join_session(session)?)
    }
}

/// Last roster snapshot taken while in a session.
///
/// The assignment task reads this instead of the live roster, so its view can
/// be one refresh stale. The session name survives disconnection so the
/// watchdog knows where to rejoin.
#[derive(Debug, Clone, Default)]
pub struct RosterCache {
    others: Option<Vec<PeerEntry>>,
    own_nickname: Option<String>,
    session: Option<String>,
    generation: u64,
}

impl RosterCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a fresh snapshot. Does nothing outside a session.
    ///
    /// Returns whether the set of peers or their nicknames changed.
    pub fn refresh(&mut self, roster: &dyn RosterService) -> Result<bool> {
        if !roster.is_connected() {
            trace!("roster refresh skipped, not in a session");
            return Ok(false);
        }

        let mut others = roster.current_peers()?;
        others.sort_by_key(|p| p.id);
        let own = roster.local_nickname()?;

        let changed = self.others.as_ref() != Some(&others);
        if changed {
            debug!(peers = others.len(), generation = self.generation + 1, "roster changed");
        }
        self.others = Some(others);
        self.own_nickname = Some(own);
        if let Some(name) = roster.session_name() {
            self.session = Some(name);
        }
        self.generation += 1;
        Ok(changed)
    }

    /// Other peers, or `None` before the first refresh.
    pub fn others(&self) -> Option<&[PeerEntry]> {
        self.others.as_deref()
    }

    pub fn own_nickname(&self) -> Option<&str> {
        self.own_nickname.as_deref()
    }

    /// Name of the last session this peer was seen in.
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// Number of refreshes taken so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
