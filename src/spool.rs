use crate::errors::{DiscoveryError, Result};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Persistent integer-keyed store bridging workers and the coordinator.
///
/// Workers `save` batches under unique keys; the coordinator `restore`s and
/// `remove`s them in ascending key order after each block cycle. Save and
/// restore are atomic per key; concurrent saves from distinct workers are
/// safe as long as keys are unique.
pub trait ResultSpool: Send + Sync {
    fn save(&self, idx: u32, entry: &Value) -> Result<()>;
    fn restore(&self, idx: u32) -> Result<Option<Value>>;
    fn remove(&self, idx: u32) -> Result<()>;
}

/// File-backed spool: one JSON file per key under a directory.
/// Survives a crash between a worker flush and the coordinator send, so the
/// stranded batch can be inspected afterwards.
pub struct FileSpool {
    dir: PathBuf,
}

impl FileSpool {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("file spool at {:?}", dir);
        Ok(Self { dir })
    }

    fn entry_path(&self, idx: u32) -> PathBuf {
        self.dir.join(format!("{idx}.json"))
    }
}

impl ResultSpool for FileSpool {
    fn save(&self, idx: u32, entry: &Value) -> Result<()> {
        let json = serde_json::to_string(entry)?;
        // Write-then-rename keeps each key's save atomic.
        let tmp = self.dir.join(format!("{idx}.json.tmp"));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, self.entry_path(idx))?;
        Ok(())
    }

    fn restore(&self, idx: u32) -> Result<Option<Value>> {
        let path = self.entry_path(idx);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let entry = serde_json::from_str(&content)
            .map_err(|e| DiscoveryError::Spool(format!("corrupt entry {idx}: {e}")))?;
        Ok(Some(entry))
    }

    fn remove(&self, idx: u32) -> Result<()> {
        let path = self.entry_path(idx);
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory spool for tests and ephemeral runs
#[derive(Default)]
pub struct MemorySpool {
    entries: Mutex<HashMap<u32, Value>>,
}

impl MemorySpool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ResultSpool for MemorySpool {
    fn save(&self, idx: u32, entry: &Value) -> Result<()> {
        self.entries.lock().insert(idx, entry.clone());
        Ok(())
    }

    fn restore(&self, idx: u32) -> Result<Option<Value>> {
        Ok(self.entries.lock().get(&idx).cloned())
    }

    fn remove(&self, idx: u32) -> Result<()> {
        self.entries.lock().remove(&idx);
        Ok(())
    }
}
