//! In-process session server implementing the broadcast contract.
//!
//! One mutex guards the whole hub. Every operation is short and never awaits,
//! and inbox sends are unbounded, so a broadcast never blocks on a slow peer.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use cardsync_protocol::{Envelope, PeerId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::conditions::LinkConditions;
use crate::error::{Result, TransportError};
use crate::types::{Broadcast, ConnectionState, Delivery, Reliability, Scope};

/// Peers per session unless the creator asks otherwise.
pub const DEFAULT_SESSION_CAPACITY: usize = 5;

/// A session as listed by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub name: String,
    pub peer_count: usize,
    pub capacity: usize,
}

impl SessionInfo {
    /// Whether another peer can join.
    pub fn is_open(&self) -> bool {
        self.peer_count < self.capacity
    }
}

/// Another member of the caller's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerEntry {
    pub id: PeerId,
    pub nickname: String,
}

struct PeerRecord {
    nickname: String,
    /// Nickname restored on reconnect.
    initial_nickname: String,
    connected: bool,
    session: Option<String>,
    inbox: mpsc::UnboundedSender<Delivery>,
}

struct SessionRecord {
    capacity: usize,
    members: BTreeSet<PeerId>,
}

struct HubInner {
    next_peer: u32,
    peers: HashMap<PeerId, PeerRecord>,
    sessions: BTreeMap<String, SessionRecord>,
    conditions: LinkConditions,
    rng: StdRng,
}

impl HubInner {
    fn new(conditions: LinkConditions) -> Self {
        let conditions = conditions.clamped();
        Self {
            next_peer: 1,
            peers: HashMap::new(),
            sessions: BTreeMap::new(),
            conditions,
            rng: StdRng::seed_from_u64(conditions.seed),
        }
    }

    fn peer(&self, id: PeerId) -> Result<&PeerRecord> {
        self.peers.get(&id).ok_or(TransportError::UnknownPeer(id))
    }

    fn peer_mut(&mut self, id: PeerId) -> Result<&mut PeerRecord> {
        self.peers.get_mut(&id).ok_or(TransportError::UnknownPeer(id))
    }

    fn connected_peer(&self, id: PeerId) -> Result<&PeerRecord> {
        let peer = self.peer(id)?;
        if !peer.connected {
            return Err(TransportError::Disconnected);
        }
        Ok(peer)
    }

    fn join(&mut self, id: PeerId, name: &str) -> Result<()> {
        if let Some(current) = &self.connected_peer(id)?.session {
            return Err(TransportError::AlreadyInSession(current.clone()));
        }

        let session = self
            .sessions
            .get_mut(name)
            .ok_or_else(|| TransportError::SessionNotFound(name.to_string()))?;
        if session.members.len() >= session.capacity {
            return Err(TransportError::SessionFull {
                name: name.to_string(),
                capacity: session.capacity,
            });
        }
        session.members.insert(id);
        self.peer_mut(id)?.session = Some(name.to_string());
        Ok(())
    }

    /// Drop session membership, returning the session name.
    fn detach(&mut self, id: PeerId) -> Option<String> {
        let name = self.peers.get_mut(&id)?.session.take()?;
        if let Some(session) = self.sessions.get_mut(&name) {
            session.members.remove(&id);
        }
        Some(name)
    }

    fn deliver(
        &mut self,
        from: PeerId,
        bytes: Bytes,
        reliability: Reliability,
        scope: Scope,
    ) -> Result<usize> {
        let session_name = self
            .connected_peer(from)?
            .session
            .clone()
            .ok_or(TransportError::NotInSession)?;
        let members: Vec<PeerId> = self
            .sessions
            .get(&session_name)
            .map(|s| s.members.iter().copied().collect())
            .unwrap_or_default();
        let conditions = self.conditions;

        let mut delivered = 0;
        for target in members {
            let local = target == from;
            if local && scope == Scope::OthersOnly {
                continue;
            }

            let copies = if local || reliability == Reliability::Reliable {
                1
            } else if self.rng.gen_bool(conditions.loss_rate) {
                trace!(%from, %target, "unreliable delivery dropped");
                0
            } else if self.rng.gen_bool(conditions.duplicate_rate) {
                trace!(%from, %target, "unreliable delivery duplicated");
                2
            } else {
                1
            };

            let Some(record) = self.peers.get(&target) else {
                continue;
            };
            if !record.connected {
                continue;
            }
            for _ in 0..copies {
                let delivery = Delivery {
                    from,
                    reliability,
                    bytes: bytes.clone(),
                };
                if record.inbox.send(delivery).is_err() {
                    trace!(%target, "inbox closed, skipping");
                    break;
                }
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}

/// Shared handle to the in-process session server.
#[derive(Clone)]
pub struct LoopbackHub {
    inner: Arc<Mutex<HubInner>>,
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHub {
    /// A hub with a perfect link.
    pub fn new() -> Self {
        Self::with_conditions(LinkConditions::perfect())
    }

    pub fn with_conditions(conditions: LinkConditions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HubInner::new(conditions))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        // Every critical section leaves the hub consistent, so a poisoned
        // lock still guards valid state.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Connect a new peer under the given nickname.
    pub fn connect(&self, nickname: impl Into<String>) -> (PeerLink, Inbox) {
        let nickname = nickname.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut inner = self.lock();
        let id = PeerId(inner.next_peer);
        inner.next_peer += 1;
        inner.peers.insert(
            id,
            PeerRecord {
                initial_nickname: nickname.clone(),
                nickname: nickname.clone(),
                connected: true,
                session: None,
                inbox: tx,
            },
        );
        drop(inner);

        info!(peer = %id, %nickname, "peer connected to hub");
        (
            PeerLink {
                hub: self.clone(),
                id,
            },
            Inbox { peer: id, rx },
        )
    }

    /// Open sessions and their occupancy, ordered by name.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.lock()
            .sessions
            .iter()
            .map(|(name, s)| SessionInfo {
                name: name.clone(),
                peer_count: s.members.len(),
                capacity: s.capacity,
            })
            .collect()
    }

    /// Replace the link conditions (the random source is reseeded).
    pub fn set_conditions(&self, conditions: LinkConditions) {
        let conditions = conditions.clamped();
        let mut inner = self.lock();
        inner.conditions = conditions;
        inner.rng = StdRng::seed_from_u64(conditions.seed);
    }

    /// Drop a peer's connection as a network timeout would.
    ///
    /// The peer leaves its session but the session stays open for a rejoin.
    pub fn sever(&self, id: PeerId) -> Result<()> {
        let mut inner = self.lock();
        inner.peer(id)?;
        let session = inner.detach(id);
        inner.peer_mut(id)?.connected = false;
        drop(inner);

        info!(peer = %id, ?session, "connection severed");
        Ok(())
    }
}

/// Send side and session control for one connected peer.
#[derive(Clone)]
pub struct PeerLink {
    hub: LoopbackHub,
    id: PeerId,
}

impl PeerLink {
    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn hub(&self) -> &LoopbackHub {
        &self.hub
    }

    /// Current connection lifecycle state.
    pub fn state(&self) -> ConnectionState {
        let inner = self.hub.lock();
        match inner.peer(self.id) {
            Ok(peer) if peer.connected => match &peer.session {
                Some(name) => ConnectionState::InSession(name.clone()),
                None => ConnectionState::Connected,
            },
            _ => ConnectionState::Disconnected,
        }
    }

    /// Nickname as the session server currently has it.
    pub fn nickname(&self) -> Result<String> {
        Ok(self.hub.lock().peer(self.id)?.nickname.clone())
    }

    /// Publish a new nickname; other members see it on their next roster read.
    pub fn set_nickname(&self, nickname: impl Into<String>) -> Result<()> {
        let nickname = nickname.into();
        let mut inner = self.hub.lock();
        inner.connected_peer(self.id)?;
        inner.peer_mut(self.id)?.nickname = nickname;
        Ok(())
    }

    /// Name of the session this peer is in.
    pub fn session_name(&self) -> Option<String> {
        match self.state() {
            ConnectionState::InSession(name) => Some(name),
            _ => None,
        }
    }

    /// All sessions known to the server.
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.hub.sessions()
    }

    /// Create a session and join it.
    pub fn create_session(&self, name: &str, capacity: usize) -> Result<()> {
        let mut inner = self.hub.lock();
        inner.connected_peer(self.id)?;
        if inner.sessions.contains_key(name) {
            return Err(TransportError::SessionExists(name.to_string()));
        }
        inner.sessions.insert(
            name.to_string(),
            SessionRecord {
                capacity: capacity.max(1),
                members: BTreeSet::new(),
            },
        );
        let joined = inner.join(self.id, name);
        if joined.is_err() {
            inner.sessions.remove(name);
        }
        drop(inner);

        joined?;
        info!(peer = %self.id, session = name, capacity, "session created");
        Ok(())
    }

    /// Join an existing session by name.
    pub fn join_session(&self, name: &str) -> Result<()> {
        self.hub.lock().join(self.id, name)?;
        info!(peer = %self.id, session = name, "joined session");
        Ok(())
    }

    /// Leave the current session; an empty session is closed.
    pub fn leave_session(&self) -> Result<()> {
        let mut inner = self.hub.lock();
        let name = inner.detach(self.id).ok_or(TransportError::NotInSession)?;
        let empty = inner
            .sessions
            .get(&name)
            .is_some_and(|s| s.members.is_empty());
        if empty {
            inner.sessions.remove(&name);
        }
        drop(inner);

        info!(peer = %self.id, session = %name, closed = empty, "left session");
        Ok(())
    }

    /// Disconnect from the server, leaving any session.
    pub fn disconnect(&self) -> Result<()> {
        let mut inner = self.hub.lock();
        inner.detach(self.id);
        inner.peer_mut(self.id)?.connected = false;
        debug!(peer = %self.id, "disconnected");
        Ok(())
    }

    /// Re-establish the server connection.
    ///
    /// The server forgets everything but the peer number: the nickname falls
    /// back to the one used on first connect.
    pub fn reconnect(&self) -> Result<()> {
        let mut inner = self.hub.lock();
        let peer = inner.peer_mut(self.id)?;
        if !peer.connected {
            peer.connected = true;
            peer.nickname = peer.initial_nickname.clone();
            info!(peer = %self.id, "reconnected to server");
        }
        Ok(())
    }

    /// Other members of this peer's session.
    pub fn session_peers(&self) -> Result<Vec<PeerEntry>> {
        let inner = self.hub.lock();
        let name = inner
            .connected_peer(self.id)?
            .session
            .clone()
            .ok_or(TransportError::NotInSession)?;
        let Some(session) = inner.sessions.get(&name) else {
            return Ok(Vec::new());
        };
        Ok(session
            .members
            .iter()
            .filter(|id| **id != self.id)
            .filter_map(|id| {
                inner.peers.get(id).map(|p| PeerEntry {
                    id: *id,
                    nickname: p.nickname.clone(),
                })
            })
            .collect())
    }
}

impl Broadcast for PeerLink {
    fn broadcast(&self, envelope: &Envelope, reliability: Reliability, scope: Scope) -> Result<()> {
        let bytes = Bytes::from(envelope.to_bytes()?);
        let delivered = self.hub.lock().deliver(self.id, bytes, reliability, scope)?;
        trace!(
            peer = %self.id,
            event = %envelope.event_id,
            ?reliability,
            ?scope,
            delivered,
            "broadcast"
        );
        Ok(())
    }
}

/// Receive side for one peer.
pub struct Inbox {
    peer: PeerId,
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl Inbox {
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Next delivery if one is waiting.
    pub fn try_recv(&mut self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next delivery. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }

    /// Everything waiting right now, in arrival order.
    pub fn drain(&mut self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Some(delivery) = self.try_recv() {
            out.push(delivery);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsync_protocol::{EventId, Field};

    fn envelope() -> Envelope {
        Envelope::new(EventId::FRAME_SYNC, vec![Field::Int(7)])
    }

    fn session_of(hub: &LoopbackHub, n: usize) -> Vec<(PeerLink, Inbox)> {
        let peers: Vec<_> = (0..n).map(|i| hub.connect(format!("Player{}", 1000 + i))).collect();
        peers[0].0.create_session("Room 1", DEFAULT_SESSION_CAPACITY).unwrap();
        for (link, _) in &peers[1..] {
            link.join_session("Room 1").unwrap();
        }
        peers
    }

    #[test]
    fn others_only_suppresses_local_echo() {
        let hub = LoopbackHub::new();
        let mut peers = session_of(&hub, 2);

        peers[0]
            .0
            .broadcast(&envelope(), Reliability::Unreliable, Scope::OthersOnly)
            .unwrap();

        assert!(peers[0].1.try_recv().is_none());
        let delivery = peers[1].1.try_recv().unwrap();
        assert_eq!(delivery.from, peers[0].0.id());
        assert_eq!(delivery.envelope().unwrap(), envelope());
    }

    #[test]
    fn all_scope_echoes_locally() {
        let hub = LoopbackHub::new();
        let mut peers = session_of(&hub, 2);

        peers[0]
            .0
            .broadcast(&envelope(), Reliability::Reliable, Scope::All)
            .unwrap();

        let echo = peers[0].1.drain();
        assert_eq!(echo.len(), 1);
        assert_eq!(echo[0].from, peers[0].0.id());
        assert_eq!(peers[1].1.drain().len(), 1);
    }

    #[test]
    fn total_loss_spares_reliable_and_local_echo() {
        let hub = LoopbackHub::with_conditions(LinkConditions::perfect().with_loss(1.0));
        let mut peers = session_of(&hub, 2);

        peers[0]
            .0
            .broadcast(&envelope(), Reliability::Unreliable, Scope::All)
            .unwrap();
        assert_eq!(peers[0].1.drain().len(), 1);
        assert!(peers[1].1.drain().is_empty());

        peers[0]
            .0
            .broadcast(&envelope(), Reliability::Reliable, Scope::OthersOnly)
            .unwrap();
        assert_eq!(peers[1].1.drain().len(), 1);
    }

    #[test]
    fn duplication_only_affects_remote_unreliable() {
        let hub = LoopbackHub::with_conditions(LinkConditions::perfect().with_duplication(1.0));
        let mut peers = session_of(&hub, 2);

        peers[0]
            .0
            .broadcast(&envelope(), Reliability::Unreliable, Scope::All)
            .unwrap();
        assert_eq!(peers[0].1.drain().len(), 1);
        assert_eq!(peers[1].1.drain().len(), 2);
    }

    #[test]
    fn out_of_range_conditions_do_not_panic() {
        let hub = LoopbackHub::with_conditions(LinkConditions {
            loss_rate: 2.5,
            duplicate_rate: -1.0,
            seed: 1,
        });
        let mut peers = session_of(&hub, 2);
        peers[0]
            .0
            .broadcast(&envelope(), Reliability::Unreliable, Scope::OthersOnly)
            .unwrap();
        assert!(peers[1].1.drain().is_empty());

        hub.set_conditions(LinkConditions {
            loss_rate: f64::NAN,
            duplicate_rate: 3.0,
            seed: 1,
        });
        peers[0]
            .0
            .broadcast(&envelope(), Reliability::Unreliable, Scope::OthersOnly)
            .unwrap();
        assert_eq!(peers[1].1.drain().len(), 2);
    }

    #[test]
    fn broadcast_outside_session_fails() {
        let hub = LoopbackHub::new();
        let (link, _inbox) = hub.connect("Player1000");
        let err = link
            .broadcast(&envelope(), Reliability::Reliable, Scope::All)
            .unwrap_err();
        assert!(matches!(err, TransportError::NotInSession));
    }

    #[test]
    fn session_capacity_is_enforced() {
        let hub = LoopbackHub::new();
        let (a, _ia) = hub.connect("a");
        let (b, _ib) = hub.connect("b");
        let (c, _ic) = hub.connect("c");

        a.create_session("Small", 2).unwrap();
        b.join_session("Small").unwrap();
        assert!(matches!(
            c.join_session("Small"),
            Err(TransportError::SessionFull { capacity: 2, .. })
        ));
        assert_eq!(hub.sessions()[0].peer_count, 2);
        assert!(!hub.sessions()[0].is_open());
    }

    #[test]
    fn roster_excludes_self_and_tracks_nicknames() {
        let hub = LoopbackHub::new();
        let peers = session_of(&hub, 3);

        peers[1].0.set_nickname("Player 1A").unwrap();
        let roster = peers[0].0.session_peers().unwrap();
        assert_eq!(roster.len(), 2);
        assert!(roster.iter().all(|p| p.id != peers[0].0.id()));
        assert!(roster.iter().any(|p| p.nickname == "Player 1A"));
    }

    #[test]
    fn sever_then_reconnect_resets_nickname_and_allows_rejoin() {
        let hub = LoopbackHub::new();
        let mut peers = session_of(&hub, 2);
        let sender = peers[0].0.clone();
        let (link, inbox) = &mut peers[1];

        link.set_nickname("Player 1B").unwrap();
        hub.sever(link.id()).unwrap();
        assert_eq!(link.state(), ConnectionState::Disconnected);

        sender
            .broadcast(&envelope(), Reliability::Reliable, Scope::OthersOnly)
            .unwrap();
        assert!(inbox.drain().is_empty());

        link.reconnect().unwrap();
        assert_eq!(link.state(), ConnectionState::Connected);
        assert_eq!(link.nickname().unwrap(), "Player1001");

        link.join_session("Room 1").unwrap();
        assert_eq!(link.state(), ConnectionState::InSession("Room 1".into()));
    }

    #[test]
    fn last_leaver_closes_session() {
        let hub = LoopbackHub::new();
        let (a, _ia) = hub.connect("a");
        a.create_session("Solo", 2).unwrap();
        a.leave_session().unwrap();
        assert!(hub.sessions().is_empty());
        assert_eq!(a.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn inbox_recv_waits_for_delivery() {
        let hub = LoopbackHub::new();
        let mut peers = session_of(&hub, 2);
        let sender = peers[0].0.clone();

        tokio::spawn(async move {
            sender
                .broadcast(&envelope(), Reliability::Reliable, Scope::OthersOnly)
                .unwrap();
        });

        let delivery = peers[1].1.recv().await.unwrap();
        assert_eq!(delivery.reliability, Reliability::Reliable);
    }

    #[test]
    fn pending_recv_is_woken_by_broadcast() {
        let hub = LoopbackHub::new();
        let mut peers = session_of(&hub, 2);
        let sender = peers[0].0.clone();
        let inbox = &mut peers[1].1;

        let mut recv = tokio_test::task::spawn(inbox.recv());
        tokio_test::assert_pending!(recv.poll());

        sender
            .broadcast(&envelope(), Reliability::Unreliable, Scope::All)
            .unwrap();
        assert!(recv.is_woken());
        let delivery = tokio_test::assert_ready!(recv.poll());
        assert_eq!(delivery.map(|d| d.from), Some(sender.id()));
    }
}
