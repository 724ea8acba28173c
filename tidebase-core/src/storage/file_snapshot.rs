// tidebase-core/src/storage/file_snapshot.rs
// File-backed snapshot storage

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::{Snapshot, SnapshotBackend};

/// Production backend: one JSON file holding the entire store.
///
/// Saves write a sibling `.tmp` file, fsync it, then rename over the
/// target, so a crash mid-write leaves the previous snapshot intact.
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        FileSnapshot {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut raw = self.path.as_os_str().to_os_string();
        raw.push(".tmp");
        PathBuf::from(raw)
    }
}

impl SnapshotBackend for FileSnapshot {
    fn load(&mut self) -> Result<Option<Snapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.path)?;
        Ok(Some(Snapshot::from_json(&bytes)?))
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        let bytes = snapshot.to_json()?;
        let temp = self.temp_path();
        let mut file = File::create(&temp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}
