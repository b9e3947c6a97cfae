
use crate::StorageResult;

/// A key-value backend for credentials and session state.
pub trait SecureStorage: Send + Sync {
    /// Short backend name used in log lines.
    fn name(&self) -> &'static str;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Delete a value. Returns whether something was removed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
