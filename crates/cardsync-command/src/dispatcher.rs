//! The invoker: holds a current command and runs it.

use tracing::trace;

use crate::command::Command;
use crate::context::CommandContext;
use crate::error::{Error, Result};
use crate::log::CommandLog;

/// Per-peer command invoker.
///
/// Owns the peer's [`CommandLog`] and [`CommandContext`]; everything that
/// executes commands on a peer goes through here.
#[derive(Debug)]
pub struct Dispatcher {
    current: Option<Command>,
    log: CommandLog,
    ctx: CommandContext,
}

impl Dispatcher {
    pub fn new(ctx: CommandContext, log: CommandLog) -> Self {
        Self {
            current: None,
            log,
            ctx,
        }
    }

    /// Store `command` as the one the next [`run`](Self::run) executes.
    pub fn set_current(&mut self, command: Command) {
        self.current = Some(command);
    }

    pub fn current(&self) -> Option<&Command> {
        self.current.as_ref()
    }

    /// Execute the current command, appending it to the log first when
    /// `record` is set.
    ///
    /// A command that fails to execute stays recorded.
    pub fn run(&mut self, record: bool) -> Result<()> {
        let command = self.current.as_ref().ok_or(Error::NoCurrentCommand)?;
        if record {
            self.log.record(command.clone());
        }
        trace!(command = %command, record, "run");
        command.execute(&mut self.ctx)
    }

    /// Execute `command` without touching the current slot or the log.
    pub fn execute_unrecorded(&mut self, command: &Command) -> Result<()> {
        trace!(command = %command, "execute");
        command.execute(&mut self.ctx)
    }

    pub fn log(&self) -> &CommandLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut CommandLog {
        &mut self.log
    }

    pub fn context_mut(&mut self) -> &mut CommandContext {
        &mut self.ctx
    }
}
