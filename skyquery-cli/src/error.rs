//! Error types emitted by the skyquery CLI.
//!
//! Keep this error type reasonably small, as every command helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use skyquery_engine::{EngineError, QueryError};
use thiserror::Error;

/// Errors emitted by the skyquery CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// The data directory does not exist or is not a directory.
    #[error("data directory {path:?} does not exist or is not a directory")]
    MissingDataDirectory { path: Utf8PathBuf },
    /// A coordinate lies outside WGS84 bounds or is not finite.
    #[error("{field} {value} is not a valid coordinate")]
    InvalidCoordinate { field: &'static str, value: f64 },
    /// Only one end of an elevation profile was given.
    #[error("a profile needs both --to-lon and --to-lat")]
    IncompleteProfile,
    /// Starting the query engine failed.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// The query itself failed.
    #[error("{operation} failed: {source}")]
    Query {
        operation: &'static str,
        #[source]
        source: QueryError,
    },
    /// Serialising the query output failed.
    #[error("failed to serialise query output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the query output failed.
    #[error("failed to write query output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
