//! In-process fallback backend.

use crate::{SecureStorage, StorageResult};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Volatile map; contents are lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }
}

impl SecureStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.data.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.data.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.data.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overwrite_and_delete() {
        let storage = MemoryStorage::new();
        storage.set("access_token", "abc123").unwrap();
        storage.set("access_token", "ghi789").unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get("access_token").unwrap().as_deref(), Some("ghi789"));
        assert!(storage.has("access_token").unwrap());

        assert!(storage.delete("access_token").unwrap());
        assert!(!storage.delete("access_token").unwrap());
        assert!(storage.is_empty());
    }
}
