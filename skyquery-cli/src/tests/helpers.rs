//! Test helpers for populating data directories.

use camino::Utf8PathBuf;
use skyquery_core::test_support::write_snapshot_fixtures;
use tempfile::TempDir;

/// A temporary data directory holding the snapshot fixtures.
pub(super) struct DataDir {
    _dir: TempDir,
    path: Utf8PathBuf,
}

impl DataDir {
    pub(super) fn with_snapshots() -> Self {
        let dir = TempDir::new().expect("tempdir");
        write_snapshot_fixtures(dir.path()).expect("write fixtures");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
        Self { _dir: dir, path }
    }

    pub(super) fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// Parse captured command output as JSON.
pub(super) fn json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("command output should be JSON")
}
