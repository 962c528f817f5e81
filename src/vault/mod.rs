//! Credential vault adapter.
//!
//! Callers depend on [`CredentialVault`], never on a concrete backend, so
//! the OS keyring can be swapped for another store without touching them.

mod memory;
mod os_keyring;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use memory::MemoryVault;
pub use os_keyring::KeyringVault;

use crate::error::VaultError;

/// Secret that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Expose the secret value to a transport.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Username and secret for one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub username: String,
    pub secret: Secret,
}

impl CredentialEntry {
    pub fn new(username: impl Into<String>, secret: impl Into<Secret>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

/// Secure storage for per-device credentials, keyed by device identifier.
pub trait CredentialVault: Send + Sync {
    /// Look up the credential for a device. A missing entry is `Ok(None)`.
    fn get(&self, device_id: &str) -> Result<Option<CredentialEntry>, VaultError>;

    /// Store or replace the credential for a device.
    fn set(&self, device_id: &str, entry: &CredentialEntry) -> Result<(), VaultError>;

    /// Remove the credential for a device. Removing a missing entry succeeds.
    fn delete(&self, device_id: &str) -> Result<(), VaultError>;
}

/// Available vault backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VaultBackend {
    /// Platform secure store (Keychain, Credential Manager, kernel keyutils).
    #[default]
    Keyring,
    /// Process-local map; nothing survives exit.
    Memory,
}

impl FromStr for VaultBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown vault backend '{other}'")),
        }
    }
}

impl fmt::Display for VaultBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyring => f.write_str("keyring"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Construct the vault for a backend.
pub fn open_vault(backend: VaultBackend, service: &str) -> Arc<dyn CredentialVault> {
    match backend {
        VaultBackend::Keyring => Arc::new(KeyringVault::new(service)),
        VaultBackend::Memory => Arc::new(MemoryVault::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_redacted() {
        let entry = CredentialEntry::new("admin", "hunter2");
        let debug = format!("{:?}", entry);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("keyring".parse::<VaultBackend>().unwrap(), VaultBackend::Keyring);
        assert_eq!("Memory".parse::<VaultBackend>().unwrap(), VaultBackend::Memory);
        assert!("plaintext".parse::<VaultBackend>().is_err());
    }

    #[test]
    fn test_open_memory_vault() {
        let vault = open_vault(VaultBackend::Memory, "netdeck");
        assert!(vault.get("10.0.0.1").unwrap().is_none());
    }
}
