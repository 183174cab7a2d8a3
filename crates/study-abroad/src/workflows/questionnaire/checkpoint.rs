use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answers::AnswerMap;

/// In-progress questionnaire state saved between visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftCheckpoint {
    pub answers: AnswerMap,
    pub cursor_node: Option<String>,
    pub history: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint could not be encoded or decoded: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("checkpoint storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage capability for draft checkpoints so engines never touch ambient globals.
pub trait CheckpointStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<DraftCheckpoint>, CheckpointError>;
    fn set(&self, key: &str, checkpoint: &DraftCheckpoint) -> Result<(), CheckpointError>;
    fn clear(&self, key: &str) -> Result<(), CheckpointError>;
}

#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: Mutex<HashMap<String, DraftCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn get(&self, key: &str) -> Result<Option<DraftCheckpoint>, CheckpointError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| CheckpointError::Unavailable("checkpoint mutex poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, checkpoint: &DraftCheckpoint) -> Result<(), CheckpointError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| CheckpointError::Unavailable("checkpoint mutex poisoned".to_string()))?;
        guard.insert(key.to_string(), checkpoint.clone());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), CheckpointError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| CheckpointError::Unavailable("checkpoint mutex poisoned".to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, CheckpointError> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                    ch
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{sanitized}.json"))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn get(&self, key: &str) -> Result<Option<DraftCheckpoint>, CheckpointError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, checkpoint: &DraftCheckpoint) -> Result<(), CheckpointError> {
        let payload = serde_json::to_vec_pretty(checkpoint)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, payload)?;
        fs::rename(staging, path)?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), CheckpointError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::questionnaire::answers::AnswerValue;
    use chrono::TimeZone;

    fn checkpoint() -> DraftCheckpoint {
        let mut answers = AnswerMap::new();
        answers.insert("study_level".to_string(), AnswerValue::text("master"));
        DraftCheckpoint {
            answers,
            cursor_node: Some("destinations".to_string()),
            history: vec!["study_level".to_string()],
            saved_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn memory_store_round_trips_and_clears() {
        let store = MemoryCheckpointStore::new();
        assert!(store.get("chat").expect("get").is_none());

        store.set("chat", &checkpoint()).expect("set");
        assert_eq!(store.get("chat").expect("get"), Some(checkpoint()));

        store.clear("chat").expect("clear");
        assert!(store.get("chat").expect("get").is_none());
    }

    #[test]
    fn file_store_persists_under_sanitized_names() {
        let root = std::env::temp_dir().join(format!(
            "study-abroad-checkpoints-{}",
            std::process::id()
        ));
        let store = FileCheckpointStore::new(&root).expect("store opens");

        store.set("user/42:chat", &checkpoint()).expect("set");
        assert!(root.join("user_42_chat.json").exists());
        assert_eq!(store.get("user/42:chat").expect("get"), Some(checkpoint()));

        store.clear("user/42:chat").expect("clear");
        store.clear("user/42:chat").expect("clearing twice is fine");
        assert!(store.get("user/42:chat").expect("get").is_none());

        let _ = fs::remove_dir_all(root);
    }
}
