//! In-memory secret storage implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Secret, SecretStore, StoreError};

/// In-memory secret store for testing and development.
///
/// This store is not persistent; data is lost when the process exits.
pub struct MemoryStore {
    data: RwLock<HashMap<String, Secret>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Create a memory store with initial data.
    pub fn with_data(data: HashMap<String, Secret>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError> {
        self.data.write().insert(key.to_string(), secret.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys: Vec<String> = self
            .data
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get() {
        let store = MemoryStore::new();
        store.set("admin_token", &Secret::new("abc")).await.unwrap();

        let retrieved = store.get("admin_token").await.unwrap();
        assert_eq!(retrieved.unwrap().expose(), "abc");
    }

    #[tokio::test]
    async fn test_memory_store_get_nonexistent() {
        let store = MemoryStore::new();
        assert!(store.get("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("client_token", &Secret::new("abc")).await.unwrap();

        store.delete("client_token").await.unwrap();
        store.delete("client_token").await.unwrap();

        assert!(store.get("client_token").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_list_keys() {
        let store = MemoryStore::new();
        store.set("admin_token", &Secret::new("t1")).await.unwrap();
        store.set("admin_user", &Secret::new("{}")).await.unwrap();
        store.set("client_token", &Secret::new("t2")).await.unwrap();

        let admin_keys = store.list_keys("admin_").await.unwrap();
        assert_eq!(admin_keys, vec!["admin_token", "admin_user"]);

        let all_keys = store.list_keys("").await.unwrap();
        assert_eq!(all_keys.len(), 3);
    }

    #[tokio::test]
    async fn test_memory_store_exists() {
        let store = MemoryStore::new();
        assert!(!store.exists("token").await.unwrap());

        store.set("token", &Secret::new("legacy")).await.unwrap();
        assert!(store.exists("token").await.unwrap());
    }
}
