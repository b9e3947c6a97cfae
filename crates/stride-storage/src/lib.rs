//! Persistent storage for the Stride session layer.
//!
//! Backends implement [`SecureStorage`]:
//! - **macOS**: Keychain via `security-framework`
//! - **Linux**: Secret Service (GNOME Keyring / KWallet) via `secret-service`
//! - **Windows**: Credential Vault via the `windows` crate
//! - a JSON file store and an in-memory map as lower tiers
//!
//! [`TieredStorage`] chains them in priority order. [`TokenStore`] and
//! [`SnapshotStore`] sit on top and never surface storage errors.

mod error;
mod file;
mod keys;
mod memory;
mod snapshot;
mod tiered;
mod tokens;
mod traits;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use snapshot::{AuthSnapshot, Role, SnapshotStore, User};
pub use tiered::{create_default_tiers, TieredStorage};
pub use tokens::{TokenPair, TokenStore};
pub use traits::SecureStorage;

/// The OS credential store for this platform, keyed under `service_name`.
pub fn create_platform_storage(service_name: &str) -> StorageResult<Box<dyn SecureStorage>> {
    #[cfg(target_os = "macos")]
    return Ok(Box::new(macos::KeychainStorage::new(service_name)?));

    #[cfg(target_os = "linux")]
    return Ok(Box::new(linux::SecretServiceStorage::new(service_name)?));

    #[cfg(target_os = "windows")]
    return Ok(Box::new(windows::CredentialStorage::new(service_name)?));

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = service_name;
        Err(StorageError::Unsupported(std::env::consts::OS))
    }
}
