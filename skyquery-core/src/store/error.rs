//! Errors raised by backing stores.

use std::path::PathBuf;

use thiserror::Error;

use crate::{Domain, SnapshotError};

/// Failure of a single store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation observed an interrupt request and stopped early.
    #[error("store operation was interrupted")]
    Interrupted,
    /// The store cannot persist records.
    #[error("{domain} store is read-only")]
    ReadOnly {
        /// Domain served by the store.
        domain: Domain,
    },
    /// An identifier does not fit the store's key space.
    #[error("record identifier {id} is out of range")]
    IdOutOfRange {
        /// Offending identifier.
        id: u64,
    },
    /// Opening the SQLite database failed.
    #[cfg(feature = "store-sqlite")]
    #[error("failed to open SQLite database at {path}: {source}")]
    OpenDatabase {
        /// Location of the SQLite database on disk.
        path: PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: rusqlite::Error,
    },
    /// Generic SQLite error while querying or writing rows.
    #[cfg(feature = "store-sqlite")]
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    /// A stored record body was not valid JSON for its type.
    #[error("failed to decode {domain} record {id}: {source}")]
    InvalidRecord {
        /// Domain of the malformed record.
        domain: Domain,
        /// Row identifier of the malformed record.
        id: u64,
        /// JSON decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A record could not be encoded for storage.
    #[error("failed to encode {domain} record: {source}")]
    EncodeRecord {
        /// Domain of the record.
        domain: Domain,
        /// JSON encoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// A legacy snapshot could not be loaded.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    /// Reading an auxiliary file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Location of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

#[cfg(feature = "store-sqlite")]
impl StoreError {
    /// Map SQLite's interrupt code onto [`StoreError::Interrupted`].
    pub(crate) fn from_sqlite(error: rusqlite::Error) -> Self {
        match error.sqlite_error_code() {
            Some(rusqlite::ErrorCode::OperationInterrupted) => Self::Interrupted,
            _ => Self::Database(error),
        }
    }
}
