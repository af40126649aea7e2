//! Tracing subscriber setup.

use std::str::FromStr;

use numlease_types::{LeaseError, Result};
use tracing_subscriber::EnvFilter;

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = LeaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "pretty" | "text" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            other => Err(LeaseError::Configuration(format!(
                "unknown log format: {other}"
            ))),
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// Fails if a subscriber is already installed.
pub fn init(format: LogFormat, default_level: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let installed = match format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    installed.map_err(|e| LeaseError::Configuration(format!("tracing init failed: {e}")))
}
