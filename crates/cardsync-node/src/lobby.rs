//! Session lobby: nicknames, session names and auto-join.

use cardsync_transport::{PeerLink, TransportError, DEFAULT_SESSION_CAPACITY};
use rand::Rng;
use tracing::info;

use crate::error::Result;

/// Fresh nickname of the form `PlayerNNNN`.
pub fn random_nickname(rng: &mut impl Rng) -> String {
    format!("Player{}", rng.gen_range(1000..10000))
}

/// Fresh session name of the form `Room NNNN`.
pub fn random_session_name(rng: &mut impl Rng) -> String {
    format!("Room {}", rng.gen_range(1000..10000))
}

/// Put `link` into a session and return its name.
///
/// With a `preferred` name, join that session or create it. Otherwise join
/// the first session with room to spare, or create a fresh one.
pub fn auto_join(link: &PeerLink, preferred: Option<&str>, rng: &mut impl Rng) -> Result<String> {
    if let Some(name) = preferred {
        match link.join_session(name) {
            Err(TransportError::SessionNotFound(_)) => {
                link.create_session(name, DEFAULT_SESSION_CAPACITY)?;
            }
            other => other?,
        }
        return Ok(name.to_string());
    }

    if let Some(open) = link.sessions().into_iter().find(|s| s.is_open()) {
        link.join_session(&open.name)?;
        return Ok(open.name);
    }

    loop {
        let name = random_session_name(rng);
        match link.create_session(&name, DEFAULT_SESSION_CAPACITY) {
            Ok(()) => {
                info!(session = %name, "no open session, created one");
                return Ok(name);
            }
            Err(TransportError::SessionExists(_)) => continue,
            Err(err) => return Err(err.into()),
        }
    }
}
