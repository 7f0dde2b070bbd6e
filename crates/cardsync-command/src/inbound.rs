//! Receive path: envelope to command, dispatched locally.

use cardsync_protocol::{DecodeError, Envelope, EventId, FrameData, Payload};
use cardsync_transport::{Delivery, Inbox};
use tracing::{debug, warn};

use crate::command::Command;
use crate::dispatcher::Dispatcher;
use crate::error::Result;

/// Build the command an inbound envelope stands for.
///
/// Ids outside [`EventId::REGISTERED`] are rejected before any field is
/// read; every registered id decodes to exactly one command variant.
pub fn command_from_envelope(envelope: &Envelope) -> std::result::Result<Command, DecodeError> {
    if !envelope.event_id.is_registered() {
        return Err(DecodeError::UnknownEvent(envelope.event_id));
    }
    match envelope.event_id {
        EventId::FRAME_SYNC => Ok(Command::SyncFrame {
            frame: FrameData::from_envelope(envelope)?,
        }),
        other => Err(DecodeError::UnknownEvent(other)),
    }
}

/// Decodes deliveries and runs them through a peer's dispatcher.
///
/// Received commands are not recorded unless the router is built with
/// [`recording`](Self::recording).
#[derive(Debug, Default)]
pub struct InboundRouter {
    record: bool,
    routed: u64,
    dropped: u64,
}

impl InboundRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record received commands into the dispatcher's log.
    #[must_use]
    pub fn recording(mut self, record: bool) -> Self {
        self.record = record;
        self
    }

    /// Commands dispatched so far.
    pub fn routed(&self) -> u64 {
        self.routed
    }

    /// Envelopes dropped as undecodable.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Dispatch one delivery. Returns `false` if it was dropped.
    pub fn route(&mut self, delivery: &Delivery, dispatcher: &mut Dispatcher) -> Result<bool> {
        let decoded = delivery
            .envelope()
            .and_then(|envelope| command_from_envelope(&envelope));
        let command = match decoded {
            Ok(command) => command,
            Err(err) => {
                warn!(from = %delivery.from, error = %err, "dropping undecodable envelope");
                self.dropped += 1;
                return Ok(false);
            }
        };

        debug!(from = %delivery.from, command = %command, "inbound");
        self.routed += 1;
        dispatcher.set_current(command);
        dispatcher.run(self.record)?;
        Ok(true)
    }

    /// Route everything waiting in `inbox`.
    ///
    /// Stops at the first execution error; later deliveries stay queued.
    pub fn pump(&mut self, inbox: &mut Inbox, dispatcher: &mut Dispatcher) -> Result<usize> {
        let mut routed = 0;
        while let Some(delivery) = inbox.try_recv() {
            if self.route(&delivery, dispatcher)? {
                routed += 1;
            }
        }
        Ok(routed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CommandContext, FrameBoard};
    use crate::log::CommandLog;
    use cardsync_protocol::{Field, MarkerFrame};
    use cardsync_transport::{Broadcast, LoopbackHub, Reliability, Scope};
    use std::sync::Arc;

    fn frame() -> FrameData {
        FrameData {
            markers: MarkerFrame {
                corners: vec![2.0; 16],
                ids: vec![3, 9],
                width: 640,
                height: 480,
            },
            player_id: 1,
            player_nick: "Player 1A".into(),
        }
    }

    #[test]
    fn decode_table_maps_frame_sync() {
        let cmd = command_from_envelope(&frame().to_envelope()).unwrap();
        assert_eq!(cmd, Command::SyncFrame { frame: frame() });

        let err = command_from_envelope(&Envelope::new(EventId(7), vec![])).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEvent(EventId(7))));
    }

    #[test]
    fn every_registered_event_has_a_decoder() {
        for id in EventId::REGISTERED {
            let err = command_from_envelope(&Envelope::new(id, vec![])).unwrap_err();
            assert!(!matches!(err, DecodeError::UnknownEvent(_)), "{id:?} has no decoder");
        }
    }

    #[test]
    fn pump_dispatches_valid_and_drops_garbage() {
        let hub = LoopbackHub::new();
        let (sender, _sender_inbox) = hub.connect("Player1000");
        let (receiver, mut inbox) = hub.connect("Player1001");
        sender.create_session("Room 1", 5).unwrap();
        receiver.join_session("Room 1").unwrap();

        sender
            .broadcast(&Envelope::new(EventId(99), vec![Field::Int(1)]), Reliability::Reliable, Scope::OthersOnly)
            .unwrap();
        sender
            .broadcast(&frame().to_envelope(), Reliability::Reliable, Scope::OthersOnly)
            .unwrap();

        let board = FrameBoard::new();
        let mut dispatcher = Dispatcher::new(
            CommandContext::new(Arc::new(receiver), board.clone()),
            CommandLog::new(),
        );
        let mut router = InboundRouter::new();

        assert_eq!(router.pump(&mut inbox, &mut dispatcher).unwrap(), 1);
        assert_eq!(router.dropped(), 1);
        assert_eq!(board.latest(1), Some(frame()));
        assert_eq!(dispatcher.log().count(), 0);
    }

    #[test]
    fn recording_router_logs_received_commands() {
        let hub = LoopbackHub::new();
        let (link, mut inbox) = hub.connect("Player1000");
        link.create_session("Room 1", 5).unwrap();
        link.broadcast(&frame().to_envelope(), Reliability::Unreliable, Scope::All)
            .unwrap();

        let mut dispatcher = Dispatcher::new(
            CommandContext::new(Arc::new(link), FrameBoard::new()),
            CommandLog::new(),
        );
        let mut router = InboundRouter::new().recording(true);
        router.pump(&mut inbox, &mut dispatcher).unwrap();
        assert_eq!(dispatcher.log().count(), 1);
    }
}
