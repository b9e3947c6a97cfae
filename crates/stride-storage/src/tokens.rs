//! Persisted access/refresh token pair.

use crate::{StorageKeys, TieredStorage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Access and refresh token, written and cleared together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Token persistence over [`TieredStorage`]. Never fails; storage trouble
/// degrades to "no tokens".
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<TieredStorage>,
}

impl TokenStore {
    pub fn new(storage: Arc<TieredStorage>) -> Self {
        Self { storage }
    }

    pub fn load(&self) -> TokenPair {
        TokenPair {
            access_token: self.storage.get(StorageKeys::ACCESS_TOKEN),
            refresh_token: self.storage.get(StorageKeys::REFRESH_TOKEN),
        }
    }

    /// Write both keys. A `None` side deletes that key.
    pub fn persist(&self, pair: &TokenPair) {
        self.storage
            .put(StorageKeys::ACCESS_TOKEN, pair.access_token.as_deref());
        self.storage
            .put(StorageKeys::REFRESH_TOKEN, pair.refresh_token.as_deref());
    }

    pub fn clear(&self) {
        self.persist(&TokenPair::empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileStorage, MemoryStorage};

    fn memory_store() -> TokenStore {
        TokenStore::new(Arc::new(TieredStorage::new(vec![Box::new(
            MemoryStorage::new(),
        )])))
    }

    #[test]
    fn test_persist_then_load() {
        let store = memory_store();
        store.persist(&TokenPair::new("abc123", "def456"));
        assert_eq!(store.load(), TokenPair::new("abc123", "def456"));
    }

    #[test]
    fn test_clear_removes_both() {
        let store = memory_store();
        store.persist(&TokenPair::new("abc123", "def456"));
        store.clear();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_partial_pair_deletes_missing_side() {
        let store = memory_store();
        store.persist(&TokenPair::new("abc123", "def456"));
        store.persist(&TokenPair {
            access_token: Some("new".into()),
            refresh_token: None,
        });

        let loaded = store.load();
        assert_eq!(loaded.access_token.as_deref(), Some("new"));
        assert_eq!(loaded.refresh_token, None);
    }

    #[test]
    fn test_tokens_survive_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let open = || {
            TokenStore::new(Arc::new(TieredStorage::new(vec![Box::new(
                FileStorage::new(&path).unwrap(),
            )])))
        };

        open().persist(&TokenPair::new("abc123", "def456"));
        assert_eq!(open().load(), TokenPair::new("abc123", "def456"));
    }
}
