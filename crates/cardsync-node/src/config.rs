//! Node configuration from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use cardsync_transport::LinkConditions;

use crate::error::{Error, Result};

/// Periods of the peer's background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub roster: Duration,
    pub assignment: Duration,
    pub reconnect: Duration,
    pub frame_sync: Duration,
    pub replay_tick: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            roster: Duration::from_millis(500),
            assignment: Duration::from_millis(500),
            reconnect: Duration::from_secs(1),
            frame_sync: Duration::from_millis(200),
            replay_tick: Duration::from_millis(20),
        }
    }
}

impl Intervals {
    /// Defaults overridden by `CARDSYNC_*_MS` variables.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();
        Ok(Self {
            roster: env_millis("CARDSYNC_ROSTER_MS", d.roster)?,
            assignment: env_millis("CARDSYNC_ASSIGN_MS", d.assignment)?,
            reconnect: env_millis("CARDSYNC_RECONNECT_MS", d.reconnect)?,
            frame_sync: env_millis("CARDSYNC_FRAME_MS", d.frame_sync)?,
            replay_tick: env_millis("CARDSYNC_REPLAY_MS", d.replay_tick)?,
        })
    }
}

/// Configuration for the `cardsync-node` binary.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Session to join or create; the first open one when unset.
    pub session: Option<String>,
    /// In-process peers to run.
    pub peers: usize,
    /// How many of those peers are fixed spectators.
    pub spectators: usize,
    pub run_for: Duration,
    /// Where the recording peer saves its command log.
    pub log_path: PathBuf,
    pub conditions: LinkConditions,
    pub intervals: Intervals,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            session: None,
            peers: 3,
            spectators: 0,
            run_for: Duration::from_secs(5),
            log_path: PathBuf::from("./cardsync-log.bin"),
            conditions: LinkConditions::default(),
            intervals: Intervals::default(),
        }
    }
}

impl NodeConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();

        let session = std::env::var("CARDSYNC_SESSION")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let log_path = std::env::var("CARDSYNC_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or(d.log_path);

        let conditions = LinkConditions::default()
            .with_loss(env_parse("CARDSYNC_LOSS_RATE", 0.0)?)
            .with_duplication(env_parse("CARDSYNC_DUPLICATE_RATE", 0.0)?)
            .with_seed(env_parse("CARDSYNC_SEED", d.conditions.seed)?);

        let config = Self {
            session,
            peers: env_parse("CARDSYNC_PEERS", d.peers)?,
            spectators: env_parse("CARDSYNC_SPECTATORS", d.spectators)?,
            run_for: Duration::from_secs(env_parse("CARDSYNC_RUN_SECS", d.run_for.as_secs())?),
            log_path,
            conditions,
            intervals: Intervals::from_env()?,
        };

        if config.spectators > config.peers {
            return Err(Error::InvalidConfig {
                key: "CARDSYNC_SPECTATORS",
                value: config.spectators.to_string(),
            });
        }
        Ok(config)
    }
}

fn env_parse<T: FromStr>(key: &'static str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig { key, value }),
        Err(_) => Ok(default),
    }
}

fn env_millis(key: &'static str, default: Duration) -> Result<Duration> {
    let millis = env_parse(key, u64::try_from(default.as_millis()).unwrap_or(u64::MAX))?;
    if millis == 0 {
        return Err(Error::InvalidConfig {
            key,
            value: millis.to_string(),
        });
    }
    Ok(Duration::from_millis(millis))
}
