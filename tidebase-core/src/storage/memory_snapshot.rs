// tidebase-core/src/storage/memory_snapshot.rs
// In-memory snapshot storage for tests and ephemeral stores

use crate::error::Result;

use super::{Snapshot, SnapshotBackend};

/// Keeps the serialised snapshot bytes in memory so save/load exercises
/// the same codec as the file backend, without touching disk.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    data: Option<Vec<u8>>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        MemorySnapshot { data: None }
    }

    /// Seed a backend with pre-serialised bytes (restart simulations).
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        MemorySnapshot { data: Some(bytes) }
    }

    /// The last saved snapshot bytes, if any.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

impl SnapshotBackend for MemorySnapshot {
    fn load(&mut self) -> Result<Option<Snapshot>> {
        match &self.data {
            Some(bytes) => Ok(Some(Snapshot::from_json(bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.data = Some(snapshot.to_json()?);
        Ok(())
    }
}
