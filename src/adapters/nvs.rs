//! Settings storage adapters.
//!
//! Implements [`SettingsStore`] two ways:
//!
//! - [`MemorySettingsStore`]: in-memory map, optionally with a byte budget
//!   so "partition full" paths can be exercised.
//! - [`FileSettingsStore`]: one file per key under a directory, written
//!   via temp-file + rename so a crash never leaves a torn value.
//!
//! Keys are `subsystem/name` paths; each segment must be non-empty and
//! contain only `[A-Za-z0-9_-]`.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::warn;

use crate::app::ports::SettingsStore;
use crate::error::StorageError;

fn valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.split('/').all(|seg| {
            !seg.is_empty()
                && seg
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        })
}

// ───────────────────────────────────────────────────────────────
// In-memory store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    map: HashMap<String, Vec<u8>>,
    budget: Option<usize>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that refuses writes once values total more than `bytes`.
    pub fn with_budget(bytes: usize) -> Self {
        Self {
            map: HashMap::new(),
            budget: Some(bytes),
        }
    }

    fn used_without(&self, key: &str) -> usize {
        self.map
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if !valid_key(key) {
            return Err(StorageError::Io);
        }
        Ok(self.map.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        if !valid_key(key) {
            return Err(StorageError::Io);
        }
        if let Some(budget) = self.budget {
            if self.used_without(key) + value.len() > budget {
                return Err(StorageError::Full);
            }
        }
        self.map.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// File-backed store
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    /// Use `root` as the settings directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            warn!("Settings: cannot create {}: {e}", root.display());
            StorageError::Io
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !valid_key(key) {
            return Err(StorageError::Io);
        }
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }
}

fn map_io(e: &std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::Io,
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("Settings: read {} failed: {e}", path.display());
                Err(map_io(&e))
            }
        }
    }

    fn save(&mut self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let tmp = path.with_extension("tmp");
            fs::write(&tmp, value)?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| {
            warn!("Settings: write {} failed: {e}", path.display());
            map_io(&e)
        })
    }
}
