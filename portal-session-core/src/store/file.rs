//! File-backed secret storage.
//!
//! Entries live in a single JSON document in the platform data directory,
//! the desktop counterpart of a browser's local storage.
//!
//! # Storage Location
//!
//! `~/.local/share/portal-session/credentials.json` on Linux,
//! `~/Library/Application Support/...` on macOS and `%APPDATA%\...` on Windows.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Secret, SecretStore, StoreError};

/// On-disk format.
#[derive(Clone, Serialize, Deserialize)]
struct FileStoreData {
    /// Version of the file format (for future migrations).
    version: u32,

    entries: BTreeMap<String, Secret>,
}

impl Default for FileStoreData {
    fn default() -> Self {
        Self {
            version: 1,
            entries: BTreeMap::new(),
        }
    }
}

/// Disk-backed key/value store.
///
/// The whole document is rewritten after every mutation; the store is small
/// (a handful of tokens and profiles) so this stays cheap.
pub struct FileStore {
    path: PathBuf,
    data: RwLock<FileStoreData>,
}

impl FileStore {
    /// Default location of the credentials file.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let dirs = directories::ProjectDirs::from("com", "portal-session", "portal-session")
            .ok_or_else(|| StoreError::BackendError {
                message: "data directory not available".to_string(),
            })?;
        Ok(dirs.data_dir().join("credentials.json"))
    }

    /// Load the store from the default location.
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from_path(Self::default_path()?)
    }

    /// Load the store from a specific path.
    ///
    /// Creates parent directories if they don't exist. A missing file is an
    /// empty store; it is written on the first mutation.
    pub fn load_from_path(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            FileStoreData::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(&*self.data.read())?;
        fs::write(&self.path, contents)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("keys_count", &self.data.read().entries.len())
            .finish()
    }
}

#[async_trait]
impl SecretStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.data.read().entries.get(key).cloned())
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        self.data
            .write()
            .entries
            .insert(key.to_string(), secret.clone());
        self.save()
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let removed = self.data.write().entries.remove(key);
        if removed.is_some() {
            self.save()?;
        }
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .data
            .read()
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
