//! macOS Keychain backend.

use crate::{SecureStorage, StorageError, StorageResult};
use security_framework::base::Error as SecurityError;
use security_framework::passwords::{
    delete_generic_password, get_generic_password, set_generic_password,
};
use tracing::debug;

/// `errSecItemNotFound`
const ITEM_NOT_FOUND: i32 = -25300;

/// Generic-password items in the login keychain, one per key.
pub struct KeychainStorage {
    service_name: String,
}

impl KeychainStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        Ok(Self {
            service_name: service_name.to_string(),
        })
    }
}

fn is_not_found(err: &SecurityError) -> bool {
    err.code() == ITEM_NOT_FOUND
}

impl SecureStorage for KeychainStorage {
    fn name(&self) -> &'static str {
        "keychain"
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Writing keychain item");

        // set_generic_password updates in place when the item exists.
        set_generic_password(&self.service_name, key, value.as_bytes())
            .map_err(|e| StorageError::Platform(format!("keychain write failed: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match get_generic_password(&self.service_name, key) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "keychain read failed: {}",
                e
            ))),
        }
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting keychain item");

        match delete_generic_password(&self.service_name, key) {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(StorageError::Platform(format!(
                "keychain delete failed: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires an unlocked login keychain
    fn test_keychain_roundtrip() {
        let storage = KeychainStorage::new("fit.stride.client.test").unwrap();
        let _ = storage.delete("access_token");

        storage.set("access_token", "abc123").unwrap();
        storage.set("access_token", "abc124").unwrap();
        assert_eq!(storage.get("access_token").unwrap().as_deref(), Some("abc124"));

        assert!(storage.delete("access_token").unwrap());
        assert!(!storage.delete("access_token").unwrap());
    }
}
