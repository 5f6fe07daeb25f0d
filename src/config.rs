//! Configuration for the default tracer assembly
//!
//! `SnaperrConfig::default()` reads these environment variables and falls back to the
//! built-in value for any that is missing or unparsable:
//!
//! - `SNAPERR_THROTTLE_WINDOW_MS`: throttle window length (default 1000)
//! - `SNAPERR_THROTTLE_MAX`: reports admitted per window (default 5)
//! - `SNAPERR_FORMAT`: `text` or `json` (default `text`)
//! - `SNAPERR_SINK`: `stdout`, `log` or `none` (default `stdout`)
//!
//! A zero (or negative) window or limit disables throttling.

use crate::error::{Result, SnaperrError};
use crate::throttle::{DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW_LENGTH_MS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ENV_THROTTLE_WINDOW_MS: &str = "SNAPERR_THROTTLE_WINDOW_MS";
pub const ENV_THROTTLE_MAX: &str = "SNAPERR_THROTTLE_MAX";
pub const ENV_FORMAT: &str = "SNAPERR_FORMAT";
pub const ENV_SINK: &str = "SNAPERR_SINK";

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = SnaperrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(SnaperrError::ConfigError(format!(
                "unknown output format '{}', expected text or json",
                other
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Where reports are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Stdout,
    Log,
    None,
}

impl FromStr for SinkKind {
    type Err = SnaperrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(Self::Stdout),
            "log" => Ok(Self::Log),
            "none" => Ok(Self::None),
            other => Err(SnaperrError::ConfigError(format!(
                "unknown sink '{}', expected stdout, log or none",
                other
            ))),
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Log => write!(f, "log"),
            Self::None => write!(f, "none"),
        }
    }
}

/// Settings used by [`crate::provider::SnaperrProvider`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnaperrConfig {
    pub throttle_window_ms: u64,
    pub throttle_max_per_window: u32,
    pub format: OutputFormat,
    pub sink: SinkKind,
}

impl Default for SnaperrConfig {
    /// Reads the environment, falling back to the defaults for missing or unparsable values
    fn default() -> Self {
        Self {
            throttle_window_ms: std::env::var(ENV_THROTTLE_WINDOW_MS)
                .ok()
                .and_then(|v| parse_clamped::<u64>(ENV_THROTTLE_WINDOW_MS, &v).ok())
                .unwrap_or(DEFAULT_WINDOW_LENGTH_MS),
            throttle_max_per_window: std::env::var(ENV_THROTTLE_MAX)
                .ok()
                .and_then(|v| parse_clamped::<u32>(ENV_THROTTLE_MAX, &v).ok())
                .unwrap_or(DEFAULT_MAX_PER_WINDOW),
            format: std::env::var(ENV_FORMAT)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            sink: std::env::var(ENV_SINK)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }
    }
}

impl SnaperrConfig {
    /// Built-in defaults, ignoring the environment
    pub fn new() -> Self {
        Self {
            throttle_window_ms: DEFAULT_WINDOW_LENGTH_MS,
            throttle_max_per_window: DEFAULT_MAX_PER_WINDOW,
            format: OutputFormat::default(),
            sink: SinkKind::default(),
        }
    }

    /// Read the environment, rejecting values that cannot be parsed
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Some(value) = env_value(ENV_THROTTLE_WINDOW_MS) {
            config.throttle_window_ms = parse_clamped(ENV_THROTTLE_WINDOW_MS, &value)?;
        }
        if let Some(value) = env_value(ENV_THROTTLE_MAX) {
            config.throttle_max_per_window = parse_clamped(ENV_THROTTLE_MAX, &value)?;
        }
        if let Some(value) = env_value(ENV_FORMAT) {
            config.format = value.parse()?;
        }
        if let Some(value) = env_value(ENV_SINK) {
            config.sink = value.parse()?;
        }

        Ok(config)
    }

    pub fn with_throttle(mut self, window_ms: u64, max_per_window: u32) -> Self {
        self.throttle_window_ms = window_ms;
        self.throttle_max_per_window = max_per_window;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_sink(mut self, sink: SinkKind) -> Self {
        self.sink = sink;
        self
    }

    pub fn is_throttling_disabled(&self) -> bool {
        self.throttle_window_ms == 0 || self.throttle_max_per_window == 0
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a non-negative integer setting; negative numbers mean "disabled" and become 0
fn parse_clamped<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr + Default,
{
    let value = value.trim();
    if let Ok(parsed) = value.parse::<T>() {
        return Ok(parsed);
    }
    match value.parse::<i64>() {
        Ok(negative) if negative < 0 => Ok(T::default()),
        _ => Err(SnaperrError::ConfigError(format!(
            "{} has invalid value '{}'",
            name, value
        ))),
    }
}

/// Held by every test that reads or writes the `SNAPERR_*` environment variables
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
