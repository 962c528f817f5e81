//! In-process vault backend.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{CredentialEntry, CredentialVault};
use crate::error::VaultError;

/// Thread-safe in-memory vault.
#[derive(Default)]
pub struct MemoryVault {
    entries: RwLock<HashMap<String, CredentialEntry>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored credentials.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> VaultError {
    VaultError::Backend("internal lock poisoned".into())
}

impl CredentialVault for MemoryVault {
    fn get(&self, device_id: &str) -> Result<Option<CredentialEntry>, VaultError> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(device_id).cloned())
    }

    fn set(&self, device_id: &str, entry: &CredentialEntry) -> Result<(), VaultError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(device_id.to_string(), entry.clone());
        Ok(())
    }

    fn delete(&self, device_id: &str) -> Result<(), VaultError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(device_id);
        Ok(())
    }
}
