//! cardsync Command - commands, dispatch, recording and replay
//!
//! Every state-changing action on a peer is a [`Command`]. The
//! [`Dispatcher`] runs commands against the peer's [`CommandContext`] and can
//! append them to its [`CommandLog`] on the way. A saved log can be loaded
//! back and re-executed by the [`ReplayScheduler`] with its original relative
//! timing.
//!
//! ```text
//! live:    Command ─▶ Dispatcher::run(record) ─▶ [CommandLog] ─▶ execute
//!                                                                  │
//!                                              SendData ─▶ Broadcast
//! inbound: Delivery ─▶ decode table ─▶ SyncFrame ─▶ Dispatcher::run(false)
//! replay:  CommandLog ─▶ snapshot ─▶ ReplayScheduler::tick ─▶ execute
//! ```

mod clock;
mod command;
mod context;
mod dispatcher;
mod error;
mod inbound;
mod log;
mod replay;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, CommandData};
pub use context::{CommandContext, FrameBoard, FrameReceiver};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use inbound::{command_from_envelope, InboundRouter};
pub use log::{CommandLog, LogEntry, LOG_MAGIC, LOG_VERSION};
pub use replay::{ReplayScheduler, ReplayState};
