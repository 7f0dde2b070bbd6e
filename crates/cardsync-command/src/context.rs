//! Per-peer execution context handed to every command.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use cardsync_protocol::FrameData;
use cardsync_transport::Broadcast;
use tracing::debug;

/// Consumer of marker frames arriving through [`Command::SyncFrame`](crate::Command::SyncFrame).
pub trait FrameReceiver: Send {
    fn receive(&mut self, frame: &FrameData);
}

/// Keeps the latest frame seen from each player.
///
/// Clones share the same board, so a peer can hand one clone to its
/// [`CommandContext`] and read from another.
#[derive(Debug, Clone, Default)]
pub struct FrameBoard {
    inner: Arc<Mutex<BoardInner>>,
}

#[derive(Debug, Default)]
struct BoardInner {
    latest: BTreeMap<i32, FrameData>,
    received: u64,
}

impl FrameBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent frame from `player_id`.
    pub fn latest(&self, player_id: i32) -> Option<FrameData> {
        self.with(|inner| inner.latest.get(&player_id).cloned())
    }

    /// Player ids with at least one frame, ascending.
    pub fn players(&self) -> Vec<i32> {
        self.with(|inner| inner.latest.keys().copied().collect())
    }

    /// Total frames received, duplicates included.
    pub fn received(&self) -> u64 {
        self.with(|inner| inner.received)
    }

    fn with<T>(&self, f: impl FnOnce(&mut BoardInner) -> T) -> T {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl FrameReceiver for FrameBoard {
    fn receive(&mut self, frame: &FrameData) {
        debug!(%frame, "frame received");
        self.with(|inner| {
            inner.received += 1;
            inner.latest.insert(frame.player_id, frame.clone());
        });
    }
}

/// Everything a command may touch while executing.
pub struct CommandContext {
    transport: Arc<dyn Broadcast>,
    frames: Box<dyn FrameReceiver>,
}

impl CommandContext {
    pub fn new(transport: Arc<dyn Broadcast>, frames: impl FrameReceiver + 'static) -> Self {
        Self {
            transport,
            frames: Box::new(frames),
        }
    }

    pub fn transport(&self) -> &dyn Broadcast {
        self.transport.as_ref()
    }

    pub fn frames_mut(&mut self) -> &mut dyn FrameReceiver {
        self.frames.as_mut()
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext").finish_non_exhaustive()
    }
}
