//! Collection persistence for the data bridge: pluggable backends plus a
//! fail-open typed store on top of them.
//!
//! Every collection is a single serialized JSON document under a fixed key.
//! [`Store::read`] and [`Store::write`] never fail: a missing, corrupt or
//! unreachable collection reads as the caller's fallback and a failed write
//! is logged and dropped. Callers that need to react to storage failures use
//! [`Store::try_read`] / [`Store::try_write`] instead.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use databridge_core::Record;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

pub const CRATE_NAME: &str = "databridge-storage";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid collection key {0:?}")]
    InvalidKey(String),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt data under {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("serializing {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Raw key/value contract a storage medium has to satisfy.
pub trait StorageBackend: Debug + Send + Sync {
    /// `Ok(None)` when nothing has been stored under `key` yet.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` document per collection under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Like [`FileBackend::new`] but creates the directory up front.
    pub fn open(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating data directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    /// Writes through a temp file and renames it into place.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|source| StorageError::Io {
            path: self.root.clone(),
            source,
        })?;

        let temp_path = self.root.join(format!(".{key}.{}.tmp", Uuid::new_v4()));
        let written = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(value.as_bytes())?;
            file.flush()
        });
        if let Err(source) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::Io {
                path: temp_path,
                source,
            });
        }

        fs::rename(&temp_path, &path).map_err(|source| {
            let _ = fs::remove_file(&temp_path);
            StorageError::Io { path, source }
        })
    }
}

/// In-process backend; contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory backend lock poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Unavailable("memory backend lock poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed access to collections over any [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct Store {
    backend: Arc<dyn StorageBackend>,
}

impl Store {
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_backend(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn open_dir(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self::new(FileBackend::open(root)?))
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    /// Blank documents count as absent.
    pub fn try_read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    pub fn try_write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, &raw)
    }

    pub fn read<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        match self.try_read(key) {
            Ok(Some(value)) => value,
            Ok(None) => fallback,
            Err(err) => {
                warn!(key, error = %err, "collection read failed; using fallback");
                fallback
            }
        }
    }

    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(err) = self.try_write(key, value) {
            warn!(key, error = %err, "collection write dropped");
        }
    }

    pub fn load<R: Record>(&self) -> Vec<R> {
        self.read(R::COLLECTION.key(), Vec::new())
    }

    pub fn save<R: Record>(&self, records: &[R]) {
        self.write(R::COLLECTION.key(), records);
    }

    pub fn try_load<R: Record>(&self) -> Result<Vec<R>, StorageError> {
        Ok(self.try_read(R::COLLECTION.key())?.unwrap_or_default())
    }

    pub fn try_save<R: Record>(&self, records: &[R]) -> Result<(), StorageError> {
        self.try_write(R::COLLECTION.key(), records)
    }
}
