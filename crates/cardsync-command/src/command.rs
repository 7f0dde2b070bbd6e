//! The closed set of commands.

use cardsync_protocol::{Envelope, EventId, FrameData, Payload};
use cardsync_transport::{Reliability, Scope, TransportError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::CommandContext;
use crate::error::Result;

/// Payload carried by [`Command::SendData`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandData {
    Frame(FrameData),
}

impl CommandData {
    pub fn event_id(&self) -> EventId {
        match self {
            CommandData::Frame(_) => FrameData::EVENT_ID,
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        match self {
            CommandData::Frame(frame) => frame.to_envelope(),
        }
    }
}

/// A unit of state-changing action.
///
/// Commands hold only what they need to execute, so the same value can be
/// dispatched live, logged, persisted and replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Broadcast a payload to the session.
    SendData {
        payload: CommandData,
        reliability: Reliability,
        scope: Scope,
    },
    /// Apply a marker frame received from a peer.
    SyncFrame { frame: FrameData },
}

impl Command {
    /// Unreliable broadcast to everyone, the sender included.
    pub fn send(payload: CommandData) -> Self {
        Command::SendData {
            payload,
            reliability: Reliability::default(),
            scope: Scope::default(),
        }
    }

    pub fn send_frame(frame: FrameData) -> Self {
        Self::send(CommandData::Frame(frame))
    }

    #[must_use]
    pub fn with_reliability(mut self, value: Reliability) -> Self {
        if let Command::SendData { reliability, .. } = &mut self {
            *reliability = value;
        }
        self
    }

    #[must_use]
    pub fn with_scope(mut self, value: Scope) -> Self {
        if let Command::SendData { scope, .. } = &mut self {
            *scope = value;
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::SendData { .. } => "SendData",
            Command::SyncFrame { .. } => "SyncFrame",
        }
    }

    /// Perform the action.
    ///
    /// Send failures other than encoding are logged and swallowed: the
    /// broadcast is fire-and-forget and the reconnect watchdogs own recovery.
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<()> {
        match self {
            Command::SendData {
                payload,
                reliability,
                scope,
            } => {
                let envelope = payload.to_envelope();
                match ctx.transport().broadcast(&envelope, *reliability, *scope) {
                    Ok(()) => Ok(()),
                    Err(TransportError::Encode(err)) => Err(err.into()),
                    Err(err) => {
                        warn!(event = %envelope.event_id, error = %err, "broadcast failed");
                        Ok(())
                    }
                }
            }
            Command::SyncFrame { frame } => {
                frame.markers.validate()?;
                ctx.frames_mut().receive(frame);
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::SendData {
                payload,
                reliability,
                scope,
            } => write!(
                f,
                "SendData(event {}, {:?}, {:?})",
                payload.event_id(),
                reliability,
                scope
            ),
            Command::SyncFrame { frame } => write!(f, "SyncFrame({})", frame),
        }
    }
}
