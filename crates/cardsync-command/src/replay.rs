//! Fixed-tick replay of a command log.
//!
//! [`ReplayScheduler::begin`] takes a private snapshot of the log, sorted by
//! timestamp (stable, so ties keep recording order). Every
//! [`tick`](ReplayScheduler::tick) advances elapsed time by one step and
//! executes every entry that has come due, without recording. Elapsed time is
//! `ticks * step`, so an entry stamped `t` fires on the first tick where
//! `elapsed >= t`: never early, and at most one step late.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::log::{CommandLog, LogEntry};

/// Slack when comparing elapsed time against timestamps.
const DUE_EPSILON: f64 = 1e-9;

/// Replay scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Replaying,
}

impl std::fmt::Display for ReplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayState::Idle => write!(f, "Idle"),
            ReplayState::Replaying => write!(f, "Replaying"),
        }
    }
}

/// Re-executes a recorded log with its original relative timing.
#[derive(Debug)]
pub struct ReplayScheduler {
    step: Duration,
    state: ReplayState,
    pending: VecDeque<LogEntry>,
    ticks: u64,
}

impl ReplayScheduler {
    /// A scheduler advancing `step` per tick.
    pub fn new(step: Duration) -> Self {
        Self {
            step,
            state: ReplayState::Idle,
            pending: VecDeque::new(),
            ticks: 0,
        }
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Seconds of log time covered so far.
    pub fn elapsed(&self) -> f64 {
        self.ticks as f64 * self.step.as_secs_f64()
    }

    /// Entries not yet fired.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    /// Start replaying a snapshot of `log`.
    ///
    /// An empty log is a no-op and returns `false`. Beginning while already
    /// replaying restarts from the new snapshot.
    pub fn begin(&mut self, log: &CommandLog) -> bool {
        if log.is_empty() {
            debug!("replay requested on empty log");
            return false;
        }

        let mut snapshot = log.entries().to_vec();
        snapshot.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        self.pending = snapshot.into();
        self.ticks = 0;
        self.state = ReplayState::Replaying;
        info!(entries = self.pending.len(), step = ?self.step, "replay started");
        true
    }

    /// Advance one step and execute every entry now due, in order.
    ///
    /// Returns the number of entries fired. A failing entry counts as
    /// consumed and does not hold back the others due in the same step; the
    /// first execution error of the step is returned once all of them ran.
    pub fn tick(&mut self, dispatcher: &mut Dispatcher) -> Result<usize> {
        if self.state == ReplayState::Idle {
            return Ok(0);
        }

        self.ticks += 1;
        let elapsed = self.elapsed();
        let mut fired = 0;
        let mut first_error = None;
        while self
            .pending
            .front()
            .is_some_and(|entry| entry.timestamp <= elapsed + DUE_EPSILON)
        {
            let Some(entry) = self.pending.pop_front() else {
                break;
            };
            fired += 1;
            if let Err(err) = dispatcher.execute_unrecorded(&entry.command) {
                warn!(command = entry.command.name(), error = %err, "replayed command failed");
                first_error.get_or_insert(err);
            }
        }

        if self.pending.is_empty() {
            self.state = ReplayState::Idle;
            info!(elapsed, "replay finished");
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(fired),
        }
    }

    /// Abandon the replay, discarding unfired entries.
    pub fn stop(&mut self) {
        if self.state == ReplayState::Replaying {
            info!(discarded = self.pending.len(), "replay stopped");
        }
        self.pending.clear();
        self.state = ReplayState::Idle;
    }
}
