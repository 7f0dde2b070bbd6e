//! cardsync Logging - tracing subscriber setup
//!
//! Every cardsync crate logs through `tracing`. Binaries call [`init`] once at
//! startup; tests call [`try_init`], which tolerates a subscriber already
//! being installed.
//!
//! `RUST_LOG` overrides the default directives. `CARDSYNC_LOG_FORMAT`
//! selects the output format: `full` (default), `compact` or `pretty`.

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Environment variable selecting the [`LogFormat`].
pub const FORMAT_ENV: &str = "CARDSYNC_LOG_FORMAT";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Some(LogFormat::Full),
            "compact" => Some(LogFormat::Compact),
            "pretty" => Some(LogFormat::Pretty),
            _ => None,
        }
    }

    /// Format named by `CARDSYNC_LOG_FORMAT`, or the default.
    pub fn from_env() -> Self {
        std::env::var(FORMAT_ENV)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    fn layer(self) -> Box<dyn Layer<Registry> + Send + Sync> {
        match self {
            LogFormat::Full => fmt::layer().boxed(),
            LogFormat::Compact => fmt::layer().compact().boxed(),
            LogFormat::Pretty => fmt::layer().pretty().boxed(),
        }
    }
}

fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directives.into())
}

/// Install the global subscriber. Panics if one is already set.
pub fn init(default_directives: &str) {
    tracing_subscriber::registry()
        .with(LogFormat::from_env().layer())
        .with(filter(default_directives))
        .init();
}

/// Install the global subscriber unless one is already set.
pub fn try_init(default_directives: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(LogFormat::from_env().layer())
        .with(filter(default_directives))
        .try_init()
}
