//! Timestamped command log and its persisted form.
//!
//! # Blob layout
//!
//! ```text
//! ┌────────┬─────────┬───────────────────────────────────────┐
//! │ "CSLG" │ version │ bincode(Vec<LogEntry>)                │
//! │ 4 bytes│ u16 LE  │ (f64 seconds, tagged Command) per row │
//! └────────┴─────────┴───────────────────────────────────────┘
//! ```
//!
//! Timestamps are stored as raw `f64`, so a save/load round trip is exact.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::command::Command;
use crate::error::{Error, Result};

/// Leading bytes of every persisted log.
pub const LOG_MAGIC: [u8; 4] = *b"CSLG";

/// Current persisted format version.
pub const LOG_VERSION: u16 = 1;

/// One recorded command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Seconds since the first record after the last clear.
    pub timestamp: f64,
    pub command: Command,
}

/// Ordered, timestamped sequence of executed commands.
pub struct CommandLog {
    clock: Arc<dyn Clock>,
    start: Option<Duration>,
    entries: Vec<LogEntry>,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLog {
    /// A log timed by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            start: None,
            entries: Vec::new(),
        }
    }

    /// Append `command`, returning its timestamp.
    ///
    /// The first record after construction or [`clear`](Self::clear) fixes the
    /// log's start time and gets timestamp zero.
    pub fn record(&mut self, command: Command) -> f64 {
        let now = self.clock.now();
        let start = *self.start.get_or_insert(now);
        let timestamp = now.saturating_sub(start).as_secs_f64();
        debug!(timestamp, command = command.name(), "recorded");
        self.entries.push(LogEntry { timestamp, command });
        timestamp
    }

    /// Forget every entry and the start time.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.start = None;
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Serialize the whole log into `writer`.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&LOG_MAGIC)?;
        writer.write_all(&LOG_VERSION.to_le_bytes())?;
        bincode::serialize_into(&mut writer, &self.entries)?;
        writer.flush()?;
        Ok(())
    }

    /// Replace the entries with a log read from `reader`.
    ///
    /// The start time is left alone, so commands recorded afterwards continue
    /// the current timeline. On error the log is unchanged.
    pub fn read_from<R: Read>(&mut self, mut reader: R) -> Result<()> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != LOG_MAGIC {
            return Err(Error::BadMagic(magic));
        }

        let mut version = [0u8; 2];
        reader.read_exact(&mut version)?;
        let version = u16::from_le_bytes(version);
        if version != LOG_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        self.entries = bincode::deserialize_from(reader)?;
        Ok(())
    }

    /// Write the log to a file, replacing it.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.write_to(BufWriter::new(File::create(path)?))?;
        info!(path = %path.display(), entries = self.count(), "command log saved");
        Ok(())
    }

    /// Replace the entries with the log stored at `path`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.read_from(BufReader::new(File::open(path)?))?;
        info!(path = %path.display(), entries = self.count(), "command log loaded");
        Ok(())
    }
}

impl std::fmt::Debug for CommandLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLog")
            .field("start", &self.start)
            .field("entries", &self.entries.len())
            .finish()
    }
}
