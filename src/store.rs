//! Artifact persistence.
//!
//! The last artifact per session, last write wins. The file-backed store keeps
//! one JSON file per session, named by the SHA-256 of the session id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::artifact::ComponentArtifact;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access artifact store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode artifact: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Artifact store lock poisoned")]
    Poisoned,
}

pub trait ArtifactStore: Send + Sync {
    fn save_artifact(&self, session_id: &str, artifact: &ComponentArtifact) -> Result<(), StoreError>;

    fn load_artifact(&self, session_id: &str) -> Result<Option<ComponentArtifact>, StoreError>;
}

impl<T: ArtifactStore + ?Sized> ArtifactStore for Arc<T> {
    fn save_artifact(&self, session_id: &str, artifact: &ComponentArtifact) -> Result<(), StoreError> {
        (**self).save_artifact(session_id, artifact)
    }

    fn load_artifact(&self, session_id: &str) -> Result<Option<ComponentArtifact>, StoreError> {
        (**self).load_artifact(session_id)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<String, ComponentArtifact>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save_artifact(&self, session_id: &str, artifact: &ComponentArtifact) -> Result<(), StoreError> {
        let mut artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;
        artifacts.insert(session_id.to_string(), artifact.clone());
        Ok(())
    }

    fn load_artifact(&self, session_id: &str) -> Result<Option<ComponentArtifact>, StoreError> {
        let artifacts = self.artifacts.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(artifacts.get(session_id).cloned())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BACKED
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Serialize, Deserialize)]
struct StoreEntry {
    session: String,
    artifact: ComponentArtifact,
}

#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

impl FileArtifactStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn compute_hash(session_id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(session_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", Self::compute_hash(session_id)))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save_artifact(&self, session_id: &str, artifact: &ComponentArtifact) -> Result<(), StoreError> {
        let path = self.entry_path(session_id);
        let entry = StoreEntry {
            session: session_id.to_string(),
            artifact: artifact.clone(),
        };
        let data = serde_json::to_string(&entry)?;
        fs::write(&path, data).map_err(|source| StoreError::Io { path, source })
    }

    fn load_artifact(&self, session_id: &str) -> Result<Option<ComponentArtifact>, StoreError> {
        let path = self.entry_path(session_id);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        match serde_json::from_str::<StoreEntry>(&data) {
            Ok(entry) if entry.session == session_id => Ok(Some(entry.artifact)),
            Ok(_) => Ok(None),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Discarding corrupt artifact entry");
                fs::remove_file(&path).ok();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryArtifactStore::new();
        assert_eq!(store.load_artifact("s1").unwrap(), None);
        store.save_artifact("s1", &ComponentArtifact::from_code("const A = 1;")).unwrap();
        store.save_artifact("s1", &ComponentArtifact::new("const B = 2;", "p{}")).unwrap();
        assert_eq!(
            store.load_artifact("s1").unwrap(),
            Some(ComponentArtifact::new("const B = 2;", "p{}"))
        );
        assert_eq!(store.load_artifact("s2").unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::open(dir.path().join("artifacts")).unwrap();
        let artifact = ComponentArtifact::new("const A = () => elem('p', null);", ".a { color: red; }");
        store.save_artifact("user/42", &artifact).unwrap();

        let reopened = FileArtifactStore::open(store.dir()).unwrap();
        assert_eq!(reopened.load_artifact("user/42").unwrap(), Some(artifact));
        assert_eq!(reopened.load_artifact("user/43").unwrap(), None);
    }

    #[test]
    fn test_file_names_are_hashed() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::open(dir.path()).unwrap();
        store.save_artifact("../escape", &ComponentArtifact::from_code("x")).unwrap();
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("{}.json", FileArtifactStore::compute_hash("../escape"))]);
    }

    #[test]
    fn test_corrupt_entry_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::open(dir.path()).unwrap();
        let path = dir.path().join(format!("{}.json", FileArtifactStore::compute_hash("s")));
        fs::write(&path, "{not json").unwrap();
        assert_eq!(store.load_artifact("s").unwrap(), None);
        assert!(!path.exists());
    }
}
