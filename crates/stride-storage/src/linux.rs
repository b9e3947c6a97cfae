//! Linux Secret Service backend (GNOME Keyring / KWallet).

use crate::{SecureStorage, StorageError, StorageResult};
use secret_service::blocking::{Collection, SecretService};
use secret_service::EncryptionType;
use std::collections::HashMap;
use tracing::debug;

/// Items in the default collection, tagged with `service` and `key`
/// attributes.
pub struct SecretServiceStorage {
    service_name: String,
}

fn platform(context: &str, err: impl std::fmt::Display) -> StorageError {
    StorageError::Platform(format!("{}: {}", context, err))
}

impl SecretServiceStorage {
    /// Fails when no Secret Service daemon is reachable on the session bus.
    pub fn new(service_name: &str) -> StorageResult<Self> {
        SecretService::connect(EncryptionType::Dh)
            .map_err(|e| platform("secret service unavailable", e))?;

        Ok(Self {
            service_name: service_name.to_string(),
        })
    }

    fn attributes<'a>(&'a self, key: &'a str) -> HashMap<&'a str, &'a str> {
        HashMap::from([("service", self.service_name.as_str()), ("key", key)])
    }

    fn in_default_collection<T>(
        &self,
        op: impl FnOnce(&Collection<'_>) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let service = SecretService::connect(EncryptionType::Dh)
            .map_err(|e| platform("secret service unavailable", e))?;
        let collection = service
            .get_default_collection()
            .map_err(|e| platform("no default collection", e))?;

        if collection.is_locked().unwrap_or(false) {
            collection
                .unlock()
                .map_err(|e| platform("collection unlock failed", e))?;
        }

        op(&collection)
    }
}

impl SecureStorage for SecretServiceStorage {
    fn name(&self) -> &'static str {
        "secret-service"
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(service = %self.service_name, key = %key, "Writing secret");

        self.in_default_collection(|collection| {
            let label = format!("{} {}", self.service_name, key);
            collection
                .create_item(&label, self.attributes(key), value.as_bytes(), true, "text/plain")
                .map(|_| ())
                .map_err(|e| platform("secret write failed", e))
        })
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.in_default_collection(|collection| {
            let items = collection
                .search_items(self.attributes(key))
                .map_err(|e| platform("secret search failed", e))?;

            let Some(item) = items.first() else {
                return Ok(None);
            };

            let bytes = item
                .get_secret()
                .map_err(|e| platform("secret read failed", e))?;
            String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string()))
        })
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(service = %self.service_name, key = %key, "Deleting secret");

        self.in_default_collection(|collection| {
            let items = collection
                .search_items(self.attributes(key))
                .map_err(|e| platform("secret search failed", e))?;

            let removed = !items.is_empty();
            for item in items {
                item.delete().map_err(|e| platform("secret delete failed", e))?;
            }
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires a Secret Service daemon on D-Bus
    fn test_secret_service_roundtrip() {
        let storage = SecretServiceStorage::new("fit.stride.client.test").unwrap();
        let _ = storage.delete("refresh_token");

        storage.set("refresh_token", "def456").unwrap();
        storage.set("refresh_token", "def457").unwrap();
        assert_eq!(storage.get("refresh_token").unwrap().as_deref(), Some("def457"));

        assert!(storage.delete("refresh_token").unwrap());
        assert!(!storage.has("refresh_token").unwrap());
    }
}
