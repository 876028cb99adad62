use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use suitcast_core::snapshot::{EngineSnapshot, SnapshotStore, StoreError};
use tempfile::NamedTempFile;
use tracing::{Level, event};

/// Snapshot kept as pretty JSON in one file. Saves go through a uniquely
/// named temp file in the same directory, synced, then renamed over the
/// previous snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

fn sync_parent_dir(parent: &Path) {
    #[cfg(unix)]
    if let Err(err) = File::open(parent).and_then(|dir| dir.sync_all()) {
        event!(
            target: "suitcast_relay::store",
            Level::DEBUG,
            path = %parent.display(),
            error = %err,
            "parent directory sync failed"
        );
    }
    #[cfg(not(unix))]
    let _ = parent;
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<EngineSnapshot>, StoreError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(EngineSnapshot::from_json(&json)?))
    }

    fn save(&self, snapshot: &EngineSnapshot) -> Result<(), StoreError> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent)?;
        let json = serde_json::to_vec_pretty(snapshot)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        temp.write_all(&json)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|err| err.error)?;

        sync_parent_dir(parent);
        Ok(())
    }
}
