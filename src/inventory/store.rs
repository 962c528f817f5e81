//! JSON-backed inventory persistence.

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use super::DeviceRecord;
use crate::error::StorageError;

/// On-disk entry. The first format stored bare address strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Legacy(String),
    Record(DeviceRecord),
}

impl From<StoredEntry> for DeviceRecord {
    fn from(entry: StoredEntry) -> Self {
        match entry {
            StoredEntry::Legacy(id) => DeviceRecord::new(id),
            StoredEntry::Record(record) => record,
        }
    }
}

/// Persists the ordered device list to a single JSON file.
///
/// A missing file is an empty inventory. Output is canonical, so loading
/// and re-saving an inventory this store wrote leaves the file unchanged.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    path: PathBuf,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records in stored order.
    pub fn load(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "inventory file missing, starting empty");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<StoredEntry> =
            serde_json::from_str(&content).map_err(|source| StorageError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        let records: Vec<DeviceRecord> = entries.into_iter().map(DeviceRecord::from).collect();

        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(StorageError::DuplicateId {
                    path: self.path.clone(),
                    id: record.id.clone(),
                });
            }
        }

        debug!(path = %self.path.display(), count = records.len(), "inventory loaded");
        Ok(records)
    }

    /// Replace the stored inventory with `records`.
    pub fn save(&self, records: &[DeviceRecord]) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let bytes = encode(records).map_err(|source| StorageError::Malformed {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, bytes).map_err(write_err)?;

        info!(path = %self.path.display(), count = records.len(), "inventory saved");
        Ok(())
    }
}

/// Canonical encoding: 4-space indented JSON plus a trailing newline.
fn encode(records: &[DeviceRecord]) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    serde::Serialize::serialize(records, &mut ser)?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Transport;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> InventoryStore {
        InventoryStore::new(dir.path().join("config").join("switches.json"))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let records = store_in(&dir).load().unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let records = vec![
            DeviceRecord::new("10.0.0.3").with_name("access-3"),
            DeviceRecord::new("10.0.0.1")
                .with_name("core-sw")
                .with_transport(Transport::Telnet)
                .with_port(2323),
            DeviceRecord::new("edge.lab").with_device_type("cisco_nxos"),
        ];

        store.save(&records).unwrap();
        assert_eq!(store.load().unwrap(), records);
    }

    #[test]
    fn test_canonical_file_is_byte_stable() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let canonical = concat!(
            "[\n",
            "    {\n",
            "        \"id\": \"10.0.0.1\",\n",
            "        \"name\": \"core-sw\",\n",
            "        \"device_type\": \"cisco_ios\",\n",
            "        \"transport\": \"ssh\"\n",
            "    }\n",
            "]\n",
        );
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), canonical).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "10.0.0.1");
        assert_eq!(records[0].name, "core-sw");

        store.save(&records).unwrap();
        assert_eq!(fs::read_to_string(store.path()).unwrap(), canonical);
    }

    #[test]
    fn test_legacy_string_list_upgraded() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"["10.0.0.1", "10.0.0.2"]"#).unwrap();

        let records = store.load().unwrap();
        assert_eq!(records, vec![DeviceRecord::new("10.0.0.1"), DeviceRecord::new("10.0.0.2")]);

        store.save(&records).unwrap();
        let upgraded = fs::read_to_string(store.path()).unwrap();
        assert!(upgraded.contains("\"id\": \"10.0.0.2\""));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StorageError::Malformed { .. }));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"[{"id": "a"}, {"ip": "a", "name": "again"}]"#).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, StorageError::DuplicateId { ref id, .. } if id == "a"));
    }

    #[test]
    fn test_unreadable_path_is_error() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be.
        let store = InventoryStore::new(dir.path());
        assert!(matches!(store.load(), Err(StorageError::Read { .. })));
    }
}
