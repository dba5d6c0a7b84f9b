//! Tracing/logging initialization.
//!
//! One `fmt` subscriber with an `EnvFilter`; JSON for machines, pretty output
//! for local development.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER: &str = "ATELIER_LOG";
pub const LOG_FORMAT: &str = "ATELIER_LOG_FORMAT";
const FALLBACK_FILTER: &str = "RUST_LOG";
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown log format {0:?} (expected \"json\" or \"pretty\")")]
pub struct UnknownLogFormat(pub String);

impl core::str::FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            _ => Err(UnknownLogFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directives, e.g. `info,atelier_auth=debug`.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `ATELIER_LOG`, then `RUST_LOG`, then `info`. An unknown format falls
    /// back to JSON; logging is not up yet, so it is reported on stderr.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let filter = non_empty(LOG_FILTER)
            .or_else(|| non_empty(FALLBACK_FILTER))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let format = match non_empty(LOG_FORMAT).map(|raw| raw.parse::<LogFormat>()) {
            None => LogFormat::default(),
            Some(Ok(format)) => format,
            Some(Err(e)) => {
                eprintln!("{e}; using json");
                LogFormat::default()
            }
        };

        Self { filter, format }
    }

    /// Parsed filter; invalid directives fall back to `info`.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

/// Initialize tracing/logging for the process from the environment.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(&ObservabilityConfig::from_env());
}

/// Initialize with an explicit config. Returns `false` if a global subscriber
/// was already installed.
pub fn init_with(config: &ObservabilityConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime);

    let installed = match config.format {
        LogFormat::Json => builder.json().with_target(false).try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    };
    if installed {
        ::tracing::debug!(filter = %config.filter, format = ?config.format, "tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> ObservabilityConfig {
        let env: HashMap<&str, &str> = pairs.iter().copied().collect();
        ObservabilityConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_to_info_json() {
        assert_eq!(config(&[]), ObservabilityConfig::default());
    }

    #[test]
    fn atelier_log_wins_over_rust_log() {
        let cfg = config(&[(LOG_FILTER, "debug"), (FALLBACK_FILTER, "warn")]);
        assert_eq!(cfg.filter, "debug");
        assert_eq!(config(&[(FALLBACK_FILTER, "warn")]).filter, "warn");
    }

    #[test]
    fn parses_format() {
        assert_eq!(config(&[(LOG_FORMAT, "Pretty")]).format, LogFormat::Pretty);
        assert_eq!(config(&[(LOG_FORMAT, "xml")]).format, LogFormat::Json);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn second_init_is_a_no_op() {
        init_with(&ObservabilityConfig::default());
        assert!(!init_with(&ObservabilityConfig::default()));
    }
}
