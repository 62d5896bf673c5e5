//! Named mapping snapshots on disk
//!
//! Each snapshot is `<dir>/<name>.json`, a JSON object whose keys are
//! gesture labels and whose values are command literals:
//!
//! ```json
//! {
//!   "Thumb_Up": "Volume Up"
//! }
//! ```
//!
//! `null` values are accepted on load and mean "not mapped".

use super::label::GestureLabel;
use super::mapping::Mapping;
use gesture_bridge_shared::Command;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SNAPSHOT_EXTENSION: &str = "json";

/// Errors from the snapshot store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid snapshot name {0:?}: use letters, digits and underscores")]
    InvalidName(String),

    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Snapshot {name} is invalid: {source}")]
    Invalid {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Snapshot I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Directory of named mapping snapshots
#[derive(Debug, Clone)]
pub struct MappingStore {
    dir: PathBuf,
}

impl MappingStore {
    /// Open a store, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Names of all stored snapshots, sorted
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_name(stem) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    pub async fn load(&self, name: &str) -> Result<Mapping, StoreError> {
        let path = self.path_for(name)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let file: BTreeMap<GestureLabel, Option<Command>> =
            serde_json::from_str(&raw).map_err(|source| StoreError::Invalid {
                name: name.to_string(),
                source,
            })?;

        Ok(file
            .into_iter()
            .filter_map(|(label, command)| Some((label, command?)))
            .collect())
    }

    pub async fn save(&self, name: &str, mapping: &Mapping) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        let file: BTreeMap<GestureLabel, Command> = mapping.iter().collect();

        let json = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !is_valid_name(name) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", name, SNAPSHOT_EXTENSION)))
    }
}

/// Snapshot names are `[A-Za-z0-9_]+`, which also keeps them inside the store
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
