//! OS keyring backend.

use keyring::Entry;
use tracing::{debug, warn};

use super::{CredentialEntry, CredentialVault, Secret};
use crate::error::VaultError;

/// Vault backed by the platform secure store via the `keyring` crate.
///
/// Each device uses two entries under the service name:
/// `<id>_username` and `<id>_password`.
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, device_id: &str, field: &str) -> Result<Entry, VaultError> {
        Entry::new(&self.service, &format!("{device_id}_{field}")).map_err(map_err)
    }

    fn read(&self, device_id: &str, field: &str) -> Result<Option<String>, VaultError> {
        match self.entry(device_id, field)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(map_err(e)),
        }
    }

    fn remove(&self, device_id: &str, field: &str) -> Result<(), VaultError> {
        match self.entry(device_id, field)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(map_err(e)),
        }
    }
}

fn map_err(e: keyring::Error) -> VaultError {
    match e {
        keyring::Error::NoStorageAccess(inner) => VaultError::Unavailable(inner.to_string()),
        keyring::Error::PlatformFailure(inner) => VaultError::Unavailable(inner.to_string()),
        other => VaultError::Backend(other.to_string()),
    }
}

impl CredentialVault for KeyringVault {
    fn get(&self, device_id: &str) -> Result<Option<CredentialEntry>, VaultError> {
        let username = self.read(device_id, "username")?;
        let password = self.read(device_id, "password")?;

        match (username, password) {
            (Some(username), Some(password)) => Ok(Some(CredentialEntry {
                username,
                secret: Secret::new(password),
            })),
            (None, None) => {
                debug!(device = device_id, "no stored credential");
                Ok(None)
            }
            _ => {
                warn!(device = device_id, "incomplete credential in keyring, ignoring");
                Ok(None)
            }
        }
    }

    fn set(&self, device_id: &str, entry: &CredentialEntry) -> Result<(), VaultError> {
        self.entry(device_id, "username")?
            .set_password(&entry.username)
            .map_err(map_err)?;
        self.entry(device_id, "password")?
            .set_password(entry.secret.expose())
            .map_err(map_err)?;
        debug!(device = device_id, "credential stored");
        Ok(())
    }

    fn delete(&self, device_id: &str) -> Result<(), VaultError> {
        self.remove(device_id, "username")?;
        self.remove(device_id, "password")
    }
}
