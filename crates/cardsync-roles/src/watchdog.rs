//! Reconnection watchdogs.
//!
//! Two independent checks, each run once a second by the peer runtime:
//! reconnect to the server when the connection dropped, and rejoin the last
//! session once connected again. Both only act for peers holding or claiming
//! a label; an unassigned peer has nothing to restore. Failures are logged
//! and retried on the next check.

use cardsync_transport::ConnectionState;
use tracing::{info, warn};

use crate::error::Error;
use crate::roster::SessionControl;

/// What a watchdog check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// Nothing to do.
    Idle,
    Reconnected,
    Rejoined,
    /// The attempt failed and will be retried.
    Retrying,
    /// Connected, holding a label, but no session name was ever cached.
    Stranded,
}

#[derive(Debug, Default)]
pub struct ReconnectWatchdog {
    server_attempts: u64,
    session_attempts: u64,
}

impl ReconnectWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconnect to the server if disconnected.
    pub fn check_server(&mut self, has_claim: bool, link: &dyn SessionControl) -> WatchdogAction {
        if !has_claim || link.connection_state() != ConnectionState::Disconnected {
            return WatchdogAction::Idle;
        }

        self.server_attempts += 1;
        match link.reconnect() {
            Ok(()) => {
                info!(attempt = self.server_attempts, "reconnected to server");
                WatchdogAction::Reconnected
            }
            Err(err) => {
                warn!(attempt = self.server_attempts, error = %err, "reconnect failed");
                WatchdogAction::Retrying
            }
        }
    }

    /// Rejoin `session` if connected but outside any session.
    pub fn check_session(
        &mut self,
        has_claim: bool,
        session: Option<&str>,
        link: &dyn SessionControl,
    ) -> WatchdogAction {
        if !has_claim || link.connection_state() != ConnectionState::Connected {
            return WatchdogAction::Idle;
        }
        let session = match session.ok_or(Error::NoSessionToRejoin) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "connected but stranded outside a session");
                return WatchdogAction::Stranded;
            }
        };

        self.session_attempts += 1;
        match link.rejoin(session) {
            Ok(()) => {
                info!(%session, attempt = self.session_attempts, "rejoined session");
                WatchdogAction::Rejoined
            }
            Err(err) => {
                warn!(%session, attempt = self.session_attempts, error = %err, "rejoin failed");
                WatchdogAction::Retrying
            }
        }
    }

    /// Total attempts, successful or not: (server, session).
    pub fn attempts(&self) -> (u64, u64) {
        (self.server_attempts, self.session_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsync_transport::LoopbackHub;

    #[test]
    fn unclaimed_peer_is_left_alone() {
        let hub = LoopbackHub::new();
        let (link, _inbox) = hub.connect("Player1000");
        link.disconnect().unwrap();

        let mut dog = ReconnectWatchdog::new();
        assert_eq!(dog.check_server(false, &link), WatchdogAction::Idle);
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn severed_peer_reconnects_then_rejoins() {
        let hub = LoopbackHub::new();
        let (link, _inbox) = hub.connect("Player1000");
        link.create_session("Room 3", 5).unwrap();
        hub.sever(link.id()).unwrap();

        let mut dog = ReconnectWatchdog::new();
        assert_eq!(dog.check_session(true, Some("Room 3"), &link), WatchdogAction::Idle);
        assert_eq!(dog.check_server(true, &link), WatchdogAction::Reconnected);
        assert_eq!(dog.check_server(true, &link), WatchdogAction::Idle);
        assert_eq!(dog.check_session(true, Some("Room 3"), &link), WatchdogAction::Rejoined);
        assert_eq!(link.state(), ConnectionState::InSession("Room 3".into()));
        assert_eq!(dog.attempts(), (1, 1));
    }

    #[test]
    fn failed_rejoin_is_retried() {
        let hub = LoopbackHub::new();
        let (link, _inbox) = hub.connect("Player1000");

        let mut dog = ReconnectWatchdog::new();
        assert_eq!(dog.check_session(true, Some("Gone"), &link), WatchdogAction::Retrying);
        assert_eq!(dog.check_session(true, Some("Gone"), &link), WatchdogAction::Retrying);
        assert_eq!(dog.attempts(), (0, 2));
    }

    #[test]
    fn claim_without_cached_session_is_stranded() {
        let hub = LoopbackHub::new();
        let (link, _inbox) = hub.connect("Player1000");

        let mut dog = ReconnectWatchdog::new();
        assert_eq!(dog.check_session(true, None, &link), WatchdogAction::Stranded);
        assert_eq!(dog.check_session(false, None, &link), WatchdogAction::Idle);
        assert_eq!(dog.attempts(), (0, 0));
        assert_eq!(link.state(), ConnectionState::Connected);
    }
}
