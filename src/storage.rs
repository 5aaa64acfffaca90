//! Durable key-value storage.
//!
//! A string-to-string store with the same shape as browser local storage.
//! Callers that only persist UI preferences treat every error here as
//! non-fatal.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to access storage file {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse storage file {path}: {source}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("failed to serialize storage: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error("storage is unavailable: {0}")]
    Unavailable(String),
}

/// `get`/`set` over string keys and values.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Process-local store. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<IndexMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a flat YAML mapping on disk.
///
/// The file is read once on open; every `set` rewrites it.
#[derive(Debug)]
pub struct FileStore {
    path: Utf8PathBuf,
    entries: Mutex<IndexMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store file.
    ///
    /// The parent directory is created if it doesn't exist. A missing file is
    /// an empty store.
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create storage directory: {}", parent))?;
            }
        }

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            if contents.trim().is_empty() {
                IndexMap::new()
            } else {
                serde_yaml_ng::from_str(&contents).map_err(|source| StorageError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            IndexMap::new()
        };

        tracing::debug!("Opened key-value store {} ({} entries)", path, entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());

        let yaml = serde_yaml_ng::to_string(&*entries)?;
        fs::write(&self.path, yaml).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!("Stored {} in {}", key, self.path);
        Ok(())
    }
}
