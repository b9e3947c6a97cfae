//! Ordered fallback across storage backends.

use crate::{FileStorage, MemoryStorage, SecureStorage};
use stride_config::Paths;
use tracing::{debug, warn};

/// Backends in priority order. For every call the first backend that does
/// not error wins; failures are logged and the next backend is tried.
///
/// Errors never reach the caller. When every backend fails a read yields
/// `None` and a write or delete is dropped.
pub struct TieredStorage {
    tiers: Vec<Box<dyn SecureStorage>>,
}

impl TieredStorage {
    pub fn new(tiers: Vec<Box<dyn SecureStorage>>) -> Self {
        Self { tiers }
    }

    /// Names of the configured backends, highest priority first.
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        for tier in &self.tiers {
            match tier.get(key) {
                Ok(value) => return value,
                Err(e) => {
                    warn!(backend = tier.name(), key = %key, error = %e, "Storage read failed, trying next backend");
                }
            }
        }
        warn!(key = %key, "All storage backends failed on read, treating value as absent");
        None
    }

    /// Write `value`, or delete the key when `value` is `None`.
    pub fn put(&self, key: &str, value: Option<&str>) {
        match value {
            Some(value) => self.set(key, value),
            None => self.delete(key),
        }
    }

    pub fn set(&self, key: &str, value: &str) {
        for tier in &self.tiers {
            match tier.set(key, value) {
                Ok(()) => {
                    debug!(backend = tier.name(), key = %key, "Stored value");
                    return;
                }
                Err(e) => {
                    warn!(backend = tier.name(), key = %key, error = %e, "Storage write failed, trying next backend");
                }
            }
        }
        warn!(key = %key, "All storage backends failed on write");
    }

    pub fn delete(&self, key: &str) {
        for tier in &self.tiers {
            match tier.delete(key) {
                Ok(_) => return,
                Err(e) => {
                    warn!(backend = tier.name(), key = %key, error = %e, "Storage delete failed, trying next backend");
                }
            }
        }
        warn!(key = %key, "All storage backends failed on delete");
    }
}

/// Platform secure storage, then the JSON file store, then memory.
/// Backends that cannot be constructed are skipped.
pub fn create_default_tiers(paths: &Paths, service_name: &str) -> TieredStorage {
    let mut tiers: Vec<Box<dyn SecureStorage>> = Vec::new();

    match crate::create_platform_storage(service_name) {
        Ok(storage) => tiers.push(storage),
        Err(e) => warn!(error = %e, "Platform secure storage unavailable"),
    }

    match FileStorage::new(paths.store_file()) {
        Ok(storage) => tiers.push(Box::new(storage)),
        Err(e) => warn!(error = %e, "File storage unavailable"),
    }

    tiers.push(Box::new(MemoryStorage::new()));

    let storage = TieredStorage::new(tiers);
    debug!(tiers = ?storage.tier_names(), "Storage tiers ready");
    storage
}
