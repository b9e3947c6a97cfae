//! Windows Credential Vault backend.

use crate::{SecureStorage, StorageError, StorageResult};
use tracing::debug;
use windows::{
    core::HSTRING,
    Security::Credentials::{PasswordCredential, PasswordVault},
};

/// `HRESULT_FROM_WIN32(ERROR_NOT_FOUND)`
const ERROR_NOT_FOUND: u32 = 0x8007_0490;

/// One vault credential per key, grouped under the service as resource.
pub struct CredentialStorage {
    resource: HSTRING,
}

fn vault() -> StorageResult<PasswordVault> {
    PasswordVault::new()
        .map_err(|e| StorageError::Platform(format!("credential vault unavailable: {}", e)))
}

impl CredentialStorage {
    pub fn new(service_name: &str) -> StorageResult<Self> {
        vault()?;
        Ok(Self {
            resource: HSTRING::from(service_name),
        })
    }

    /// Look up the credential for `key`, mapping "not found" to `None`.
    fn find(&self, vault: &PasswordVault, key: &str) -> StorageResult<Option<PasswordCredential>> {
        match vault.Retrieve(&self.resource, &HSTRING::from(key)) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) if e.code().0 as u32 == ERROR_NOT_FOUND => Ok(None),
            Err(e) => Err(StorageError::Platform(format!(
                "credential lookup failed: {}",
                e
            ))),
        }
    }
}

impl SecureStorage for CredentialStorage {
    fn name(&self) -> &'static str {
        "credential-vault"
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        debug!(key = %key, "Writing credential");

        let vault = vault()?;
        if let Some(existing) = self.find(&vault, key)? {
            let _ = vault.Remove(&existing);
        }

        let credential = PasswordCredential::CreatePasswordCredential(
            &self.resource,
            &HSTRING::from(key),
            &HSTRING::from(value),
        )
        .map_err(|e| StorageError::Platform(format!("credential build failed: {}", e)))?;

        vault
            .Add(&credential)
            .map_err(|e| StorageError::Platform(format!("credential write failed: {}", e)))
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let vault = vault()?;
        let Some(credential) = self.find(&vault, key)? else {
            return Ok(None);
        };

        // Password is only populated after RetrievePassword.
        credential
            .RetrievePassword()
            .and_then(|_| credential.Password())
            .map(|password| Some(password.to_string()))
            .map_err(|e| StorageError::Platform(format!("credential read failed: {}", e)))
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        debug!(key = %key, "Deleting credential");

        let vault = vault()?;
        match self.find(&vault, key)? {
            Some(credential) => {
                vault.Remove(&credential).map_err(|e| {
                    StorageError::Platform(format!("credential delete failed: {}", e))
                })?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
