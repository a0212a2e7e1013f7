//! Engine configuration.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What happens to queued queries when the engine shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShutdownPolicy {
    /// Fail queued queries with [`QueryError::Shutdown`](crate::QueryError::Shutdown)
    /// without running them.
    #[default]
    Abort,
    /// Run every queued query before the worker exits.
    Drain,
}

/// Kind of record store opened from the data directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backend {
    /// One SQLite database per domain, `<domain>.db`.
    #[default]
    Sqlite,
    /// One read-only legacy snapshot per domain, `<domain>.snap`.
    Snapshot,
    /// Empty in-memory stores; the data directory is not consulted for
    /// record domains.
    Memory,
}

/// Error returned when parsing a [`Backend`] or [`ShutdownPolicy`] name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseNameError {
    kind: &'static str,
    value: String,
}

impl FromStr for Backend {
    type Err = ParseNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "snapshot" => Ok(Self::Snapshot),
            "memory" => Ok(Self::Memory),
            _ => Err(ParseNameError {
                kind: "backend",
                value: value.to_owned(),
            }),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sqlite => "sqlite",
            Self::Snapshot => "snapshot",
            Self::Memory => "memory",
        })
    }
}

impl FromStr for ShutdownPolicy {
    type Err = ParseNameError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "drain" => Ok(Self::Drain),
            _ => Err(ParseNameError {
                kind: "shutdown policy",
                value: value.to_owned(),
            }),
        }
    }
}

/// Settings consumed by [`Engine::open`](crate::Engine::open).
///
/// Auxiliary data sets are read from fixed file names inside `data_dir`:
/// `terrain.snap`, `weather.snap` and `bitmapmaps.snap`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the data sets.
    pub data_dir: PathBuf,
    /// Store kind for record domains.
    pub backend: Backend,
    /// Open the terrain model.
    pub load_terrain: bool,
    /// Open the weather catalogue.
    pub load_weather: bool,
    /// Open the chart catalogue.
    pub load_bitmap_maps: bool,
    /// Behaviour for queued queries at shutdown.
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            backend: Backend::default(),
            load_terrain: true,
            load_weather: false,
            load_bitmap_maps: false,
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}
