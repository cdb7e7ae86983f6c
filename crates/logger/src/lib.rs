//! Tracing subscriber setup shared by the uptime binaries.
//!
//! The level comes from the caller (usually the config file) and can be
//! overridden per target with `RUST_LOG`. The output format is either the
//! caller's choice or, when the caller has none, `RUST_LOG_FORMAT`.

use std::env::var;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single line, human readable, no timestamps
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set, which callers in tests can ignore.
pub fn init_with(level: LevelFilter, format: Option<LogFormat>) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let log_layer = match format.unwrap_or_else(format_from_env) {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).try_init()
}

fn format_from_env() -> LogFormat {
    let raw = match var("RUST_LOG_FORMAT") {
        Ok(raw) => raw,
        Err(_) => return LogFormat::default(),
    };

    raw.parse().unwrap_or_else(|error| {
        warn!("Ignoring RUST_LOG_FORMAT, falling back to compact: {error}");
        LogFormat::default()
    })
}
