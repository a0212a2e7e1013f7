//! Legacy snapshot file format.
//!
//! A snapshot is a read-only export of one domain: a fixed header followed by
//! a `bincode` payload of entries. The header records the domain so a terrain
//! snapshot cannot be opened as an airport store by accident.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use bincode::{deserialize_from, serialize_into};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::Domain;

/// File identifier for snapshots.
pub(crate) const SNAPSHOT_MAGIC: [u8; 4] = *b"SKQS";

/// Supported version of the snapshot format.
pub(crate) const SNAPSHOT_VERSION: u16 = 1;

/// Error emitted when loading or validating a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The snapshot could not be read from disk.
    #[error("failed to read snapshot from {path}: {source}")]
    Io {
        /// Location of the snapshot.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The payload could not be decoded.
    #[error("failed to decode snapshot from {path}: {source}")]
    Decode {
        /// Location of the snapshot.
        path: PathBuf,
        /// Decoder error returned by `bincode`.
        #[source]
        source: bincode::Error,
    },
    /// The file did not contain the expected header.
    #[error("invalid snapshot magic: expected {expected:?}, found {found:?}")]
    InvalidMagic {
        /// Expected byte sequence identifying a snapshot.
        expected: [u8; 4],
        /// Sequence read from the file.
        found: [u8; 4],
    },
    /// The reader encountered an unsupported format version.
    #[error("unsupported snapshot version {found}; supported version is {supported}")]
    UnsupportedVersion {
        /// Version present in the file header.
        found: u16,
        /// Latest version supported by this binary.
        supported: u16,
    },
    /// The snapshot holds a different domain.
    #[error("snapshot holds {found} data, expected {expected}")]
    DomainMismatch {
        /// Domain requested by the caller.
        expected: Domain,
        /// Domain recorded in the file.
        found: String,
    },
}

/// Error emitted when writing a snapshot to disk.
#[derive(Debug, Error)]
pub enum SnapshotWriteError {
    /// Writing bytes to disk failed.
    #[error("failed to write snapshot to {path}: {source}")]
    Io {
        /// Destination file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The entries could not be encoded.
    #[error("failed to encode snapshot for {path}: {source}")]
    Encode {
        /// Destination file path.
        path: PathBuf,
        /// Encoder failure from `bincode`.
        #[source]
        source: bincode::Error,
    },
}

/// Persist `entries` as a snapshot of `domain`.
///
/// Existing files are truncated.
pub fn write_snapshot<T: Serialize>(
    path: &Path,
    domain: Domain,
    entries: &[T],
) -> Result<(), SnapshotWriteError> {
    let io_error = |source| SnapshotWriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_error)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&SNAPSHOT_MAGIC).map_err(io_error)?;
    writer
        .write_all(&SNAPSHOT_VERSION.to_le_bytes())
        .map_err(io_error)?;
    serialize_into(&mut writer, domain.as_str()).map_err(|source| {
        SnapshotWriteError::Encode {
            path: path.to_path_buf(),
            source,
        }
    })?;
    serialize_into(&mut writer, entries).map_err(|source| SnapshotWriteError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    let file = writer
        .into_inner()
        .map_err(|err| io_error(err.into_error()))?;
    file.sync_all().map_err(io_error)
}

/// Load the entries of a `domain` snapshot.
pub fn read_snapshot<T: DeserializeOwned>(
    path: &Path,
    domain: Domain,
) -> Result<Vec<T>, SnapshotError> {
    let io_error = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_error)?);

    let mut magic = [0_u8; 4];
    reader.read_exact(&mut magic).map_err(io_error)?;
    if magic != SNAPSHOT_MAGIC {
        return Err(SnapshotError::InvalidMagic {
            expected: SNAPSHOT_MAGIC,
            found: magic,
        });
    }

    let mut version = [0_u8; 2];
    reader.read_exact(&mut version).map_err(io_error)?;
    let found = u16::from_le_bytes(version);
    if found != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion {
            found,
            supported: SNAPSHOT_VERSION,
        });
    }

    let decode_error = |source| SnapshotError::Decode {
        path: path.to_path_buf(),
        source,
    };
    let tag: String = deserialize_from(&mut reader).map_err(decode_error)?;
    if tag != domain.as_str() {
        return Err(SnapshotError::DomainMismatch {
            expected: domain,
            found: tag,
        });
    }
    let entries: Vec<T> = deserialize_from(&mut reader).map_err(decode_error)?;
    log::debug!(
        "loaded {} {domain} entries from snapshot {}",
        entries.len(),
        path.display()
    );
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    #[rstest]
    fn reads_back_written_entries(temp_dir: TempDir) {
        let path = temp_dir.path().join("names.snap");
        let names = vec![String::from("EGLL"), String::from("LSZH")];
        write_snapshot(&path, Domain::Airport, &names).expect("write snapshot");
        let loaded: Vec<String> = read_snapshot(&path, Domain::Airport).expect("read snapshot");
        assert_eq!(loaded, names);
    }

    #[rstest]
    fn rejects_wrong_magic(temp_dir: TempDir) {
        let path = temp_dir.path().join("bad.snap");
        std::fs::write(&path, b"BAD!\x01\x00").expect("write corrupt file");
        let err = read_snapshot::<String>(&path, Domain::Airport).expect_err("bad magic");
        assert!(matches!(err, SnapshotError::InvalidMagic { found, .. } if &found == b"BAD!"));
    }

    #[rstest]
    fn rejects_future_version(temp_dir: TempDir) {
        let path = temp_dir.path().join("future.snap");
        {
            let mut file = File::create(&path).expect("create snapshot");
            file.write_all(&SNAPSHOT_MAGIC).expect("write magic");
            file.write_all(&(SNAPSHOT_VERSION + 1).to_le_bytes())
                .expect("write version");
        }
        let err = read_snapshot::<String>(&path, Domain::Airport).expect_err("future version");
        assert!(matches!(
            err,
            SnapshotError::UnsupportedVersion { found, supported }
                if found == SNAPSHOT_VERSION + 1 && supported == SNAPSHOT_VERSION
        ));
    }

    #[rstest]
    fn rejects_other_domain(temp_dir: TempDir) {
        let path = temp_dir.path().join("navaids.snap");
        write_snapshot::<String>(&path, Domain::Navaid, &[]).expect("write snapshot");
        let err = read_snapshot::<String>(&path, Domain::Airport).expect_err("domain mismatch");
        assert!(matches!(
            err,
            SnapshotError::DomainMismatch { expected: Domain::Airport, ref found } if found == "navaids"
        ));
    }

    #[rstest]
    fn missing_file_reports_path(temp_dir: TempDir) {
        let path = temp_dir.path().join("absent.snap");
        let err = read_snapshot::<String>(&path, Domain::Airport).expect_err("missing file");
        assert!(matches!(err, SnapshotError::Io { path: ref p, .. } if p == &path));
    }
}
