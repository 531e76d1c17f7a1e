//! Secret storage abstraction.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for sensitive values that prevents accidental logging
//! - [`SecretStore`] - Trait for persistent key/value backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`FileStore`] - JSON file on disk, the default persistent backend
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`create_store`] - Helper to build the configured backend
//!
//! # Example
//!
//! ```rust,ignore
//! use portal_session_core::store::{Secret, SecretStore, StoreBackend, create_store};
//!
//! let store = create_store(&StoreBackend::Memory)?;
//!
//! store.set("admin_token", &Secret::new("eyJhbGciOi...")).await?;
//! let token = store.get("admin_token").await?;
//! assert_eq!(token.unwrap().expose(), "eyJhbGciOi...");
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod file;
#[cfg(feature = "keyring-store")]
mod keyring;
mod memory;

pub use file::FileStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;
pub use memory::MemoryStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose).
/// Debug and Display implementations show `[REDACTED]` instead of the value,
/// and the backing memory is zeroed when the secret is dropped.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True for the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for secret store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Access to the secret was denied.
    #[error("access denied to secret: {key}")]
    AccessDenied { key: String },

    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over persistent key/value backends.
///
/// Implementations include:
/// - [`MemoryStore`] - In-memory storage for testing
/// - [`FileStore`] - JSON document on disk
/// - [`KeyringStore`] (with `keyring-store` feature) - OS keyring
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key.
    ///
    /// Overwrites any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List all keys matching a prefix.
    ///
    /// Returns an empty vec if no keys match.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Check if a key exists without retrieving the value.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }
}

/// Which backend [`create_store`] should build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StoreBackend {
    /// Non-persistent, process-local storage.
    Memory,

    /// JSON file at the given path.
    File { path: PathBuf },

    /// OS keyring under the given service name.
    Keyring { service: String },
}

/// Create a secret store for the requested backend.
///
/// # Backend Selection Logic
///
/// - [`StoreBackend::Memory`]: a fresh [`MemoryStore`]
/// - [`StoreBackend::File`]: a [`FileStore`] loaded from the path; I/O and
///   parse failures are returned
/// - [`StoreBackend::Keyring`]: a [`KeyringStore`] when the feature is
///   enabled and the platform keyring is reachable, otherwise a
///   [`MemoryStore`] with a warning
pub fn create_store(backend: &StoreBackend) -> Result<Arc<dyn SecretStore>, StoreError> {
    match backend {
        StoreBackend::Memory => {
            tracing::debug!("Using in-memory credential storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::File { path } => {
            tracing::debug!(path = %path.display(), "Using file credential storage");
            Ok(Arc::new(FileStore::load_from_path(path.clone())?))
        }
        StoreBackend::Keyring { service } => Ok(keyring_or_memory(service)),
    }
}

#[cfg(feature = "keyring-store")]
fn keyring_or_memory(service: &str) -> Arc<dyn SecretStore> {
    match KeyringStore::try_new(service) {
        Ok(store) => {
            tracing::info!("Using OS keyring for credential storage");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Keyring unavailable ({}), falling back to memory store. \
                 Credentials will not persist across restarts.",
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(not(feature = "keyring-store"))]
fn keyring_or_memory(service: &str) -> Arc<dyn SecretStore> {
    tracing::warn!(
        service,
        "Keyring storage requested but keyring-store feature not enabled. \
         Using memory store. Credentials will not persist across restarts."
    );
    Arc::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("super-secret");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_secret_display_redacted() {
        let secret = Secret::new("super-secret");
        let display = format!("{}", secret);
        assert!(!display.contains("super-secret"));
        assert!(display.contains("REDACTED"));
    }

    #[test]
    fn test_secret_is_empty() {
        assert!(Secret::new("").is_empty());
        assert!(!Secret::new("abc").is_empty());
    }

    #[test]
    fn test_store_backend_deserialize() {
        let backend: StoreBackend =
            serde_json::from_str(r#"{"kind": "file", "path": "/tmp/creds.json"}"#).unwrap();
        assert_eq!(
            backend,
            StoreBackend::File {
                path: PathBuf::from("/tmp/creds.json")
            }
        );
    }

    #[tokio::test]
    async fn test_create_store_memory() {
        let store = create_store(&StoreBackend::Memory).unwrap();

        store.set("test-key", &Secret::new("test")).await.unwrap();
        let retrieved = store.get("test-key").await.unwrap();
        assert_eq!(retrieved, Some(Secret::new("test")));
    }

    #[tokio::test]
    async fn test_create_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("creds.json");
        let store = create_store(&StoreBackend::File { path: path.clone() }).unwrap();

        store.set("client_token", &Secret::new("t")).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_create_store_keyring_is_usable() {
        // Either the keyring or the memory fallback; both must accept writes
        // or fail cleanly on headless systems.
        let store = create_store(&StoreBackend::Keyring {
            service: "portal-session-test".to_string(),
        })
        .unwrap();

        let key = "test-key-prefer";
        if store.set(key, &Secret::new("test")).await.is_err() {
            return;
        }
        if let Ok(Some(retrieved)) = store.get(key).await {
            assert_eq!(retrieved.expose(), "test");
        }
        let _ = store.delete(key).await;
    }
}
