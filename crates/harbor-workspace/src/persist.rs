//! Snapshot persistence.
//!
//! One opaque key holds the serialized workspace. The file-backed store
//! writes atomically (tmp + rename) so a crash mid-write never corrupts
//! the snapshot; a decode failure at startup falls back to an empty
//! workspace rather than failing.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{info, warn};

use harbor_common::PersistError;

use crate::layout::WorkspaceSnapshot;

pub trait SnapshotStore: Send + Sync {
    /// `None` when nothing was persisted yet or the payload is
    /// undecodable.
    fn load(&self) -> Option<WorkspaceSnapshot>;
    fn save(&self, snapshot: &WorkspaceSnapshot);
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Platform default: `<data dir>/harbor/workspace.json`.
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::data_dir()?.join("harbor").join("workspace.json"))
    }

    fn write_atomic(&self, json: &str) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            warn!("atomic rename failed ({e}), falling back to direct write");
            std::fs::write(&self.path, json)?;
        }
        Ok(())
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Option<WorkspaceSnapshot> {
        if !self.path.exists() {
            return None;
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                warn!("failed to read snapshot {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => {
                info!("restored workspace snapshot from {}", self.path.display());
                Some(snapshot)
            }
            Err(e) => {
                warn!("undecodable workspace snapshot, starting fresh: {e}");
                None
            }
        }
    }

    fn save(&self, snapshot: &WorkspaceSnapshot) {
        let json = match serde_json::to_string_pretty(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize workspace snapshot: {e}");
                return;
            }
        };
        if let Err(e) = self.write_atomic(&json) {
            warn!("failed to persist workspace snapshot: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Test double and embedder fallback.
#[derive(Default)]
pub struct MemorySnapshotStore {
    slot: Mutex<Option<WorkspaceSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_snapshot(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    pub fn seed(&self, snapshot: WorkspaceSnapshot) {
        *self.slot.lock().unwrap() = Some(snapshot);
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Option<WorkspaceSnapshot> {
        self.slot.lock().unwrap().clone()
    }

    fn save(&self, snapshot: &WorkspaceSnapshot) {
        *self.slot.lock().unwrap() = Some(snapshot.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Pane, Tab};

    fn snapshot_with_one_tab() -> WorkspaceSnapshot {
        let tab = Tab::new("staging", "staging");
        let mut pane = Pane::new();
        pane.tabs = vec![tab.id.clone()];
        pane.active_tab = Some(tab.id.clone());
        WorkspaceSnapshot {
            focused_pane: Some(pane.id.clone()),
            panes: vec![pane],
            tabs: vec![tab],
        }
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("workspace.json"));
        assert!(store.load().is_none());

        store.save(&snapshot_with_one_tab());
        let restored = store.load().expect("snapshot");
        assert_eq!(restored.panes.len(), 1);
        assert_eq!(restored.tabs.len(), 1);
    }

    #[test]
    fn file_store_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("nested/deep/workspace.json"));
        store.save(&snapshot_with_one_tab());
        assert!(store.load().is_some());
    }

    #[test]
    fn corrupt_snapshot_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("workspace.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = FileSnapshotStore::new(path);
        assert!(store.load().is_none());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySnapshotStore::new();
        assert!(!store.has_snapshot());
        store.save(&snapshot_with_one_tab());
        assert!(store.has_snapshot());
        assert_eq!(store.load().unwrap().tabs.len(), 1);
    }
}
