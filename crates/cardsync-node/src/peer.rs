//! One peer: its context, its periodic tasks and the loop driving them.
//!
//! Every task is a plain `&mut self` method so tests can drive a peer tick by
//! tick. [`Peer::run`] schedules the same methods on tokio intervals inside a
//! single task, so they never run concurrently with each other or with
//! inbound dispatch.

use std::sync::Arc;
use std::time::Duration;

use cardsync_command::{
    Clock, Command, CommandContext, CommandLog, Dispatcher, FrameBoard, InboundRouter,
    ReplayScheduler, ReplayState, SystemClock,
};
use cardsync_protocol::{FrameData, PeerId};
use cardsync_roles::{
    AssignmentConfig, ListenerToken, ReconnectWatchdog, Role, RoleAssigner, RoleEvent,
    RosterCache, Subject, WatchdogAction,
};
use cardsync_transport::{ConnectionState, Delivery, Inbox, PeerLink};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Intervals;
use crate::error::Result;
use crate::markers::{MarkerSource, NoMarkers};

/// Lifecycle notifications published by a peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    ConnectionChanged(ConnectionState),
    RosterChanged { peers: usize },
    Role(RoleEvent),
    Watchdog(WatchdogAction),
}

/// Requests accepted by a running peer, see [`Peer::run_controlled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerControl {
    /// Replay this peer's command log from the start.
    BeginReplay,
    StopReplay,
}

/// Per-peer settings.
pub struct PeerConfig {
    pub assignment: AssignmentConfig,
    /// Record locally issued commands.
    pub record: bool,
    /// Record commands received from the session as well.
    pub record_inbound: bool,
    pub replay_tick: Duration,
    pub clock: Arc<dyn Clock>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            assignment: AssignmentConfig::default(),
            record: false,
            record_inbound: false,
            replay_tick: Intervals::default().replay_tick,
            clock: Arc::new(SystemClock::new()),
        }
    }
}

impl PeerConfig {
    #[must_use]
    pub fn with_assignment(mut self, assignment: AssignmentConfig) -> Self {
        self.assignment = assignment;
        self
    }

    #[must_use]
    pub fn with_recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    #[must_use]
    pub fn with_inbound_recording(mut self, record: bool) -> Self {
        self.record_inbound = record;
        self
    }

    #[must_use]
    pub fn with_replay_tick(mut self, tick: Duration) -> Self {
        self.replay_tick = tick;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// A session participant.
pub struct Peer {
    link: PeerLink,
    inbox: Inbox,
    dispatcher: Dispatcher,
    router: InboundRouter,
    board: FrameBoard,
    cache: RosterCache,
    assigner: RoleAssigner,
    watchdog: ReconnectWatchdog,
    replay: ReplayScheduler,
    markers: Box<dyn MarkerSource>,
    events: Subject<PeerEvent>,
    record: bool,
    last_state: ConnectionState,
}

impl Peer {
    pub fn new(link: PeerLink, inbox: Inbox, config: PeerConfig) -> Self {
        let board = FrameBoard::new();
        let ctx = CommandContext::new(Arc::new(link.clone()), board.clone());
        let dispatcher = Dispatcher::new(ctx, CommandLog::with_clock(config.clock));
        let last_state = link.state();

        Self {
            link,
            inbox,
            dispatcher,
            router: InboundRouter::new().recording(config.record_inbound),
            board,
            cache: RosterCache::new(),
            assigner: RoleAssigner::new(config.assignment),
            watchdog: ReconnectWatchdog::new(),
            replay: ReplayScheduler::new(config.replay_tick),
            markers: Box::new(NoMarkers),
            events: Subject::new(),
            record: config.record,
            last_state,
        }
    }

    #[must_use]
    pub fn with_markers(mut self, markers: impl MarkerSource + 'static) -> Self {
        self.markers = Box::new(markers);
        self
    }

    pub fn id(&self) -> PeerId {
        self.link.id()
    }

    pub fn link(&self) -> &PeerLink {
        &self.link
    }

    pub fn role(&self) -> Role {
        self.assigner.role()
    }

    pub fn assigner(&self) -> &RoleAssigner {
        &self.assigner
    }

    /// Latest frames received from each player.
    pub fn board(&self) -> &FrameBoard {
        &self.board
    }

    pub fn log(&self) -> &CommandLog {
        self.dispatcher.log()
    }

    pub fn log_mut(&mut self) -> &mut CommandLog {
        self.dispatcher.log_mut()
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    pub fn replay_state(&self) -> ReplayState {
        self.replay.state()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PeerEvent) + Send + 'static) -> ListenerToken {
        self.events.attach(listener)
    }

    pub fn unsubscribe(&mut self, token: ListenerToken) -> bool {
        self.events.detach(token)
    }

    /// Run a locally issued command, recording it if this peer records.
    pub fn issue(&mut self, command: Command) -> Result<()> {
        self.dispatcher.set_current(command);
        self.dispatcher.run(self.record)?;
        Ok(())
    }

    /// Roster task: refresh the cached roster.
    pub fn refresh_roster(&mut self) -> Result<()> {
        self.observe_connection();
        if self.cache.refresh(&self.link)? {
            let peers = self.cache.others().map_or(0, |o| o.len());
            self.events.notify_all(&PeerEvent::RosterChanged { peers });
        }
        Ok(())
    }

    /// Assignment task: one step of the role protocol.
    pub fn assign(&mut self) -> Result<()> {
        let mut role_events = Vec::new();
        let outcome = self.assigner.tick(&self.cache, &self.link, &mut role_events);
        for event in role_events {
            self.events.notify_all(&PeerEvent::Role(event));
        }
        Ok(outcome?)
    }

    /// Watchdog task: restore the server connection, then the session.
    pub fn watch_connection(&mut self) {
        let has_claim = self.assigner.has_claim();
        let server = self.watchdog.check_server(has_claim, &self.link);
        let session = self
            .watchdog
            .check_session(has_claim, self.cache.session(), &self.link);

        for action in [server, session] {
            if action != WatchdogAction::Idle {
                self.events.notify_all(&PeerEvent::Watchdog(action));
            }
        }
        self.observe_connection();
    }

    /// Frame sync task: broadcast the current marker frame to the session.
    ///
    /// Skipped outside a session.
    pub fn sync_frame(&mut self) -> Result<()> {
        if !self.link.state().in_session() {
            return Ok(());
        }
        let frame = FrameData {
            markers: self.markers.current(),
            player_id: self.assigner.effective_role().player_number(),
            player_nick: self.link.nickname()?,
        };
        self.issue(Command::send_frame(frame))
    }

    /// Dispatch one inbound delivery.
    pub fn handle_delivery(&mut self, delivery: &Delivery) -> Result<bool> {
        Ok(self.router.route(delivery, &mut self.dispatcher)?)
    }

    /// Dispatch everything waiting in the inbox.
    pub fn pump_inbox(&mut self) -> Result<usize> {
        Ok(self.router.pump(&mut self.inbox, &mut self.dispatcher)?)
    }

    /// Start replaying this peer's command log.
    pub fn begin_replay(&mut self) -> bool {
        self.replay.begin(self.dispatcher.log())
    }

    /// Replay task: one fixed tick of the replay clock.
    pub fn replay_tick(&mut self) -> Result<usize> {
        Ok(self.replay.tick(&mut self.dispatcher)?)
    }

    pub fn stop_replay(&mut self) {
        self.replay.stop();
    }

    fn observe_connection(&mut self) {
        let state = self.link.state();
        if state != self.last_state {
            info!(peer = %self.id(), from = %self.last_state, to = %state, "connection state changed");
            self.last_state = state.clone();
            self.events.notify_all(&PeerEvent::ConnectionChanged(state));
        }
    }

    /// Drive every task on its interval until `shutdown` flips to `true`
    /// (or its sender is dropped), then hand the peer back.
    pub async fn run(self, intervals: Intervals, shutdown: watch::Receiver<bool>) -> Self {
        let (_control_tx, control) = mpsc::unbounded_channel();
        self.run_controlled(intervals, shutdown, control).await
    }

    /// [`run`](Self::run), also accepting [`PeerControl`] requests while
    /// running. A closed `control` channel is ignored.
    pub async fn run_controlled(
        mut self,
        intervals: Intervals,
        mut shutdown: watch::Receiver<bool>,
        mut control: mpsc::UnboundedReceiver<PeerControl>,
    ) -> Self {
        let mut roster = interval(intervals.roster);
        let mut assignment = interval(intervals.assignment);
        let mut reconnect = interval(intervals.reconnect);
        let mut frame_sync = interval(intervals.frame_sync);
        let mut replay = interval(intervals.replay_tick);
        for timer in [&mut roster, &mut assignment, &mut reconnect, &mut frame_sync, &mut replay] {
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        let mut control_open = true;
        info!(peer = %self.id(), "peer running");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                message = control.recv(), if control_open => match message {
                    Some(PeerControl::BeginReplay) => {
                        if self.begin_replay() {
                            replay.reset();
                        } else {
                            debug!(peer = %self.id(), "nothing to replay");
                        }
                    }
                    Some(PeerControl::StopReplay) => self.stop_replay(),
                    None => control_open = false,
                },
                delivery = self.inbox.recv() => {
                    let Some(delivery) = delivery else {
                        warn!(peer = %self.id(), "inbox closed");
                        break;
                    };
                    if let Err(err) = self.handle_delivery(&delivery) {
                        warn!(peer = %self.id(), error = %err, "inbound command failed");
                    }
                }
                _ = roster.tick() => {
                    if let Err(err) = self.refresh_roster() {
                        debug!(peer = %self.id(), error = %err, "roster refresh failed");
                    }
                }
                _ = assignment.tick() => {
                    if let Err(err) = self.assign() {
                        warn!(peer = %self.id(), error = %err, "assignment step failed");
                    }
                }
                _ = reconnect.tick() => self.watch_connection(),
                _ = frame_sync.tick() => {
                    if let Err(err) = self.sync_frame() {
                        warn!(peer = %self.id(), error = %err, "frame sync failed");
                    }
                }
                _ = replay.tick(), if self.replay.state() == ReplayState::Replaying => {
                    if let Err(err) = self.replay_tick() {
                        warn!(peer = %self.id(), error = %err, "replayed command failed");
                    }
                }
            }
        }

        self.replay.stop();
        info!(peer = %self.id(), role = %self.role(), "peer stopped");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::SyntheticMarkers;
    use cardsync_command::ManualClock;
    use cardsync_roles::{Endpoint, Seat, SeatLabel};
    use cardsync_transport::LoopbackHub;
    use std::sync::Mutex;

    fn peer_in(hub: &LoopbackHub, nickname: &str, config: PeerConfig) -> Peer {
        let (link, inbox) = hub.connect(nickname);
        if link.join_session("Room 1").is_err() {
            link.create_session("Room 1", 5).unwrap();
        }
        Peer::new(link, inbox, config)
    }

    #[test]
    fn frame_sync_echoes_and_records() {
        let hub = LoopbackHub::new();
        let clock = ManualClock::new();
        let mut peer = peer_in(
            &hub,
            "Player1000",
            PeerConfig::default()
                .with_recording(true)
                .with_clock(Arc::new(clock.clone())),
        )
        .with_markers(SyntheticMarkers::new(1, vec![5]));

        peer.sync_frame().unwrap();
        clock.advance(Duration::from_millis(200));
        peer.sync_frame().unwrap();
        assert_eq!(peer.log().count(), 2);
        assert_eq!(peer.log().entries()[1].timestamp, 0.2);

        assert_eq!(peer.pump_inbox().unwrap(), 2);
        let own = peer.board().latest(0).unwrap();
        assert_eq!(own.player_nick, "Player1000");
        assert_eq!(own.markers.ids, vec![5]);
        assert_eq!(peer.log().count(), 2, "echo is not recorded");
    }

    #[test]
    fn events_reach_subscribers() {
        let hub = LoopbackHub::new();
        let mut peer = peer_in(&hub, "Player1000", PeerConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        peer.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        for _ in 0..4 {
            peer.refresh_roster().unwrap();
            peer.assign().unwrap();
        }

        let one_a = SeatLabel::new(Seat::One, Endpoint::Primary);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], PeerEvent::RosterChanged { peers: 0 });
        assert!(seen.contains(&PeerEvent::Role(RoleEvent::Claimed(one_a))));
        assert!(seen.contains(&PeerEvent::Role(RoleEvent::Assigned(Role::Seat(one_a)))));
        assert_eq!(peer.role(), Role::Seat(one_a));
    }

    #[test]
    fn replay_reissues_recorded_frames() {
        let hub = LoopbackHub::new();
        let clock = ManualClock::new();
        let mut peer = peer_in(
            &hub,
            "Player1000",
            PeerConfig::default()
                .with_recording(true)
                .with_clock(Arc::new(clock.clone()))
                .with_replay_tick(Duration::from_millis(100)),
        );
        peer.sync_frame().unwrap();
        clock.advance(Duration::from_millis(300));
        peer.sync_frame().unwrap();
        peer.pump_inbox().unwrap();
        let before = peer.board().received();

        assert!(peer.begin_replay());
        let mut fired = 0;
        while peer.replay_state() == ReplayState::Replaying {
            fired += peer.replay_tick().unwrap();
        }
        assert_eq!(fired, 2);
        assert_eq!(peer.pump_inbox().unwrap(), 2);
        assert_eq!(peer.board().received(), before + 2);
        assert_eq!(peer.log().count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_assigns_a_role_and_stops_on_shutdown() {
        let hub = LoopbackHub::new();
        let peer = peer_in(&hub, "Player1000", PeerConfig::default());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(peer.run(Intervals::default(), rx));
        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(true).unwrap();

        let peer = handle.await.unwrap();
        assert_eq!(
            peer.role(),
            Role::Seat(SeatLabel::new(Seat::One, Endpoint::Primary))
        );
        assert!(peer.board().received() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn replay_can_be_started_while_running() {
        let hub = LoopbackHub::new();
        let clock = ManualClock::new();
        let mut peer = peer_in(
            &hub,
            "Player1000",
            PeerConfig::default()
                .with_recording(true)
                .with_clock(Arc::new(clock.clone())),
        );
        peer.issue(Command::send_frame(FrameData::default())).unwrap();
        clock.advance(Duration::from_millis(100));
        peer.issue(Command::send_frame(FrameData::default())).unwrap();
        peer.pump_inbox().unwrap();

        // Frame sync is pushed out of the way so only replayed frames arrive.
        let intervals = Intervals {
            frame_sync: Duration::from_secs(3600),
            ..Intervals::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(peer.run_controlled(intervals, shutdown_rx, control_rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        control_tx.send(PeerControl::BeginReplay).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();

        let peer = handle.await.unwrap();
        assert_eq!(peer.replay_state(), ReplayState::Idle);
        assert_eq!(peer.log().count(), 2);
        assert!(peer.board().received() >= 2 + 2);
    }
}
