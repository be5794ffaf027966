use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Smallest time window the backend accepts, in seconds.
pub const MIN_TIME_WINDOW_SECS: u64 = 1;
/// Largest time window the backend accepts, in seconds.
pub const MAX_TIME_WINDOW_SECS: u64 = 60;

/// Dashboard configuration, read from `config.toml`.
///
/// Every field has a default, so a missing file and a partial file both
/// work.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the sentiment backend.
    pub backend_url: String,
    /// Keyword the stream card starts with.
    pub keyword: String,
    /// Time window the stream card starts with, in seconds (1-60).
    pub time_window_secs: u64,
    /// How many timeline rows the stream card shows.
    pub display_window: usize,
    /// Redraw tick, in milliseconds.
    pub tick_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8080".to_string(),
            keyword: "technology".to_string(),
            time_window_secs: 3,
            display_window: 20,
            tick_ms: 250,
        }
    }
}

impl Config {
    /// Load from `path` when given, else from the default location.
    /// A missing file falls back to defaults; an unreadable or malformed
    /// one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        config.time_window_secs = clamp_time_window(config.time_window_secs);
        Ok(config)
    }

    /// `<config_dir>/sentui/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sentui").join("config.toml"))
    }
}

/// Clamp a time window to what the backend accepts.
pub fn clamp_time_window(secs: u64) -> u64 {
    secs.clamp(MIN_TIME_WINDOW_SECS, MAX_TIME_WINDOW_SECS)
}
