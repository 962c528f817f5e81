//! Device list controller.
//!
//! Owns the in-memory inventory between load and save and is the only
//! way to mutate it. Every mutation is applied to a copy, persisted, and
//! only then committed, so a failed save leaves the list untouched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::{NetdeckError, Result};
use crate::inventory::{DeviceRecord, InventoryStore};
use crate::session::{CloseReason, Session, SessionDispatcher};
use crate::vault::{CredentialEntry, CredentialVault};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Orchestrates inventory edits, credential lookup, and session dispatch.
pub struct DeviceController {
    store: InventoryStore,
    vault: Arc<dyn CredentialVault>,
    dispatcher: SessionDispatcher,
    connect_timeout: Duration,
    devices: Vec<DeviceRecord>,
    selected: Option<String>,
    active: Option<Active>,
}

/// The open session and the inventory id it belongs to, which follows
/// renames while the session's own record snapshot does not.
struct Active {
    device_id: String,
    session: Session,
}

impl DeviceController {
    pub fn new(
        store: InventoryStore,
        vault: Arc<dyn CredentialVault>,
        dispatcher: SessionDispatcher,
    ) -> Self {
        Self {
            store,
            vault,
            dispatcher,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            devices: Vec::new(),
            selected: None,
            active: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn dispatcher(&self) -> &SessionDispatcher {
        &self.dispatcher
    }

    /// Replace the in-memory inventory with the stored one.
    pub fn load(&mut self) -> Result<&[DeviceRecord]> {
        self.devices = self.store.load()?;
        if let Some(id) = &self.selected {
            if !self.devices.iter().any(|d| &d.id == id) {
                self.selected = None;
            }
        }
        debug!(count = self.devices.len(), "inventory loaded");
        Ok(&self.devices)
    }

    /// Devices in inventory order.
    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn device(&self, id: &str) -> Option<&DeviceRecord> {
        self.devices.iter().find(|d| d.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.devices
            .iter()
            .position(|d| d.id == id)
            .ok_or_else(|| NetdeckError::DeviceNotFound(id.to_string()))
    }

    fn commit(&mut self, next: Vec<DeviceRecord>) -> Result<()> {
        self.store.save(&next)?;
        self.devices = next;
        Ok(())
    }

    fn validate(record: &DeviceRecord) -> Result<()> {
        if record.id.trim().is_empty() {
            return Err(NetdeckError::InvalidDevice("identifier must not be empty".into()));
        }
        if record.id.trim() != record.id {
            return Err(NetdeckError::InvalidDevice(format!(
                "identifier '{}' has surrounding whitespace",
                record.id
            )));
        }
        Ok(())
    }

    /// Append a device. Identifiers are unique; a clash is rejected.
    pub fn add(&mut self, record: DeviceRecord) -> Result<()> {
        Self::validate(&record)?;
        if self.device(&record.id).is_some() {
            return Err(NetdeckError::DuplicateDevice(record.id));
        }
        let mut next = self.devices.clone();
        let id = record.id.clone();
        next.push(record);
        self.commit(next)?;
        info!(device = %id, "device added");
        Ok(())
    }

    /// Replace the device `id` with `record`, keeping its position.
    ///
    /// Renaming moves the stored credential to the new identifier. If that
    /// move fails the rename is kept and the vault error is returned.
    pub fn edit(&mut self, id: &str, record: DeviceRecord) -> Result<()> {
        Self::validate(&record)?;
        let pos = self.position(id)?;
        let renamed = record.id != id;
        if renamed && self.device(&record.id).is_some() {
            return Err(NetdeckError::DuplicateDevice(record.id));
        }

        let mut next = self.devices.clone();
        next[pos] = record.clone();
        self.commit(next)?;
        info!(device = %record.id, "device updated");

        if renamed {
            if self.selected.as_deref() == Some(id) {
                self.selected = Some(record.id.clone());
            }
            if let Some(active) = self.active.as_mut().filter(|a| a.device_id == id) {
                active.device_id = record.id.clone();
            }
            if let Some(credential) = self.vault.get(id)? {
                self.vault.set(&record.id, &credential)?;
                self.vault.delete(id)?;
                debug!(from = %id, to = %record.id, "credential moved");
            }
        }
        Ok(())
    }

    /// Remove a device and its stored credential.
    ///
    /// An active session on that device is force-closed with
    /// [`CloseReason::DeviceRemoved`].
    pub fn remove(&mut self, id: &str) -> Result<DeviceRecord> {
        let pos = self.position(id)?;
        let mut next = self.devices.clone();
        let removed = next.remove(pos);
        self.commit(next)?;
        info!(device = %id, "device removed");

        if self.active.as_ref().is_some_and(|a| a.device_id == id) {
            if let Some(active) = self.active.take() {
                active.session.close_with(CloseReason::DeviceRemoved);
            }
        }
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        self.vault.delete(id)?;
        Ok(removed)
    }

    /// Move the listed devices to the front in the given order.
    ///
    /// Unknown identifiers are ignored; unlisted devices follow in their
    /// existing relative order.
    pub fn reorder<I, S>(&mut self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rest = self.devices.clone();
        let mut next = Vec::with_capacity(rest.len());
        for id in ids {
            if let Some(pos) = rest.iter().position(|d| d.id == id.as_ref()) {
                next.push(rest.remove(pos));
            }
        }
        next.append(&mut rest);
        if next == self.devices {
            return Ok(());
        }
        self.commit(next)
    }

    pub fn select(&mut self, id: &str) -> Result<&DeviceRecord> {
        let pos = self.position(id)?;
        self.selected = Some(id.to_string());
        Ok(&self.devices[pos])
    }

    pub fn selected(&self) -> Option<&DeviceRecord> {
        self.selected.as_deref().and_then(|id| self.device(id))
    }

    /// Stored credential for a device, if any.
    pub fn credential(&self, id: &str) -> Result<Option<CredentialEntry>> {
        self.position(id)?;
        let entry = self.vault.get(id)?;
        if entry.is_none() {
            debug!(device = %id, "no stored credential");
        }
        Ok(entry)
    }

    pub fn store_credential(&self, id: &str, credential: &CredentialEntry) -> Result<()> {
        self.position(id)?;
        self.vault.set(id, credential)?;
        info!(device = %id, user = %credential.username, "credential stored");
        Ok(())
    }

    pub fn forget_credential(&self, id: &str) -> Result<()> {
        self.position(id)?;
        self.vault.delete(id)?;
        info!(device = %id, "credential removed");
        Ok(())
    }

    /// Open a session to `id`, closing any other active session first.
    ///
    /// Without a stored credential `prompt` is asked for one. A prompted
    /// credential is saved only after the device accepts it.
    pub async fn connect<F>(&mut self, id: &str, prompt: F) -> Result<Session>
    where
        F: FnOnce(&DeviceRecord) -> Option<CredentialEntry>,
    {
        let record = self.devices[self.position(id)?].clone();
        let (credential, prompted) = match self.vault.get(id)? {
            Some(credential) => (credential, false),
            None => {
                let credential =
                    prompt(&record).ok_or_else(|| NetdeckError::CredentialMissing(id.to_string()))?;
                (credential, true)
            }
        };

        self.disconnect();
        self.selected = Some(record.id.clone());

        let session = self
            .dispatcher
            .open(&record, &credential, self.connect_timeout)
            .await?;

        if prompted {
            if let Err(e) = self.vault.set(id, &credential) {
                warn!(device = %id, error = %e, "could not store credential");
            }
        }
        self.active = Some(Active {
            device_id: record.id,
            session: session.clone(),
        });
        Ok(session)
    }

    /// Close the active session. Returns whether one was open.
    pub fn disconnect(&mut self) -> bool {
        match self.active.take() {
            Some(Active { session, .. }) => {
                let was_open = session.is_open();
                session.close();
                was_open
            }
            None => false,
        }
    }

    /// The active session, while it is open.
    pub fn active_session(&self) -> Option<&Session> {
        self.active
            .as_ref()
            .map(|a| &a.session)
            .filter(|s| s.is_open())
    }
}

impl Drop for DeviceController {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::Transport;
    use crate::session::mock::MockConnector;
    use crate::session::SessionState;
    use crate::vault::MemoryVault;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        controller: DeviceController,
        vault: Arc<MemoryVault>,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = InventoryStore::new(dir.path().join("config").join("switches.json"));
        let vault = Arc::new(MemoryVault::new());
        let dispatcher = SessionDispatcher::default()
            .with_connector(Transport::Ssh, Arc::new(MockConnector::new("admin", "x")));
        let mut controller = DeviceController::new(store, vault.clone(), dispatcher)
            .with_connect_timeout(Duration::from_secs(2));
        controller.load().unwrap();
        Fixture {
            _dir: dir,
            controller,
            vault,
        }
    }

    fn ids(controller: &DeviceController) -> Vec<&str> {
        controller.devices().iter().map(|d| d.id.as_str()).collect()
    }

    #[test]
    fn test_add_persists() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1").with_name("core-sw")).unwrap();
        fx.controller.load().unwrap();
        assert_eq!(fx.controller.devices()[0].name, "core-sw");
    }

    #[test]
    fn test_add_duplicate_rejected() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();
        let err = fx.controller.add(DeviceRecord::new("10.0.0.1").with_name("other")).unwrap_err();
        assert!(matches!(err, NetdeckError::DuplicateDevice(id) if id == "10.0.0.1"));
        assert_eq!(fx.controller.devices().len(), 1);
    }

    #[test]
    fn test_add_rejects_empty_id() {
        let mut fx = fixture();
        assert!(matches!(
            fx.controller.add(DeviceRecord::new("  ")),
            Err(NetdeckError::InvalidDevice(_))
        ));
    }

    #[test]
    fn test_edit_rename_onto_existing_rejected() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("a")).unwrap();
        fx.controller.add(DeviceRecord::new("b")).unwrap();
        let err = fx.controller.edit("a", DeviceRecord::new("b")).unwrap_err();
        assert!(matches!(err, NetdeckError::DuplicateDevice(_)));
        assert_eq!(ids(&fx.controller), vec!["a", "b"]);
    }

    #[test]
    fn test_edit_rename_moves_credential_and_selection() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();
        fx.controller
            .store_credential("10.0.0.1", &CredentialEntry::new("admin", "x"))
            .unwrap();
        fx.controller.select("10.0.0.1").unwrap();

        fx.controller
            .edit("10.0.0.1", DeviceRecord::new("10.0.0.2").with_name("core-sw"))
            .unwrap();

        assert_eq!(ids(&fx.controller), vec!["10.0.0.2"]);
        assert!(fx.vault.get("10.0.0.1").unwrap().is_none());
        assert_eq!(fx.vault.get("10.0.0.2").unwrap().unwrap().username, "admin");
        assert_eq!(fx.controller.selected().unwrap().id, "10.0.0.2");
    }

    #[test]
    fn test_failed_save_leaves_inventory_untouched() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let store = InventoryStore::new(blocker.join("switches.json"));
        let mut controller = DeviceController::new(
            store,
            Arc::new(MemoryVault::new()),
            SessionDispatcher::default(),
        );

        assert!(matches!(
            controller.add(DeviceRecord::new("10.0.0.1")),
            Err(NetdeckError::Storage(_))
        ));
        assert!(controller.devices().is_empty());
    }

    #[test]
    fn test_reorder_policy() {
        let mut fx = fixture();
        for id in ["a", "b", "c", "d"] {
            fx.controller.add(DeviceRecord::new(id)).unwrap();
        }
        fx.controller.reorder(["c", "zz", "a"]).unwrap();
        assert_eq!(ids(&fx.controller), vec!["c", "a", "b", "d"]);
        fx.controller.load().unwrap();
        assert_eq!(ids(&fx.controller), vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_remove_deletes_credential() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();
        fx.controller
            .store_credential("10.0.0.1", &CredentialEntry::new("admin", "x"))
            .unwrap();
        fx.controller.select("10.0.0.1").unwrap();

        let removed = fx.controller.remove("10.0.0.1").unwrap();
        assert_eq!(removed.id, "10.0.0.1");
        assert!(fx.vault.is_empty());
        assert!(fx.controller.selected().is_none());
        assert!(matches!(
            fx.controller.remove("10.0.0.1"),
            Err(NetdeckError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_credential_calls_require_known_device() {
        let fx = fixture();
        assert!(matches!(
            fx.controller.credential("nope"),
            Err(NetdeckError::DeviceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_prompts_and_stores_after_success() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();

        let session = fx
            .controller
            .connect("10.0.0.1", |_| Some(CredentialEntry::new("admin", "x")))
            .await
            .unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(fx.vault.get("10.0.0.1").unwrap().unwrap().secret.expose(), "x");
        assert!(fx.controller.active_session().is_some());
        assert!(fx.controller.disconnect());
        assert!(fx.controller.active_session().is_none());
    }

    #[tokio::test]
    async fn test_connect_rejected_credential_not_stored() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();

        let err = fx
            .controller
            .connect("10.0.0.1", |_| Some(CredentialEntry::new("admin", "wrong")))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NetdeckError::Connect(crate::error::ConnectError::AuthFailed { .. })
        ));
        assert!(fx.vault.is_empty());
        assert!(fx.controller.active_session().is_none());
    }

    #[tokio::test]
    async fn test_connect_without_credential_aborts() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();
        let err = fx.controller.connect("10.0.0.1", |_| None).await.unwrap_err();
        assert!(matches!(err, NetdeckError::CredentialMissing(_)));
    }

    #[tokio::test]
    async fn test_remove_force_closes_active_session() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();
        fx.controller
            .store_credential("10.0.0.1", &CredentialEntry::new("admin", "x"))
            .unwrap();
        let session = fx.controller.connect("10.0.0.1", |_| None).await.unwrap();

        fx.controller.remove("10.0.0.1").unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.close_reason(), Some(CloseReason::DeviceRemoved));
        assert!(fx.controller.active_session().is_none());
    }

    #[tokio::test]
    async fn test_remove_after_rename_closes_session() {
        let mut fx = fixture();
        fx.controller.add(DeviceRecord::new("10.0.0.1")).unwrap();
        fx.controller
            .store_credential("10.0.0.1", &CredentialEntry::new("admin", "x"))
            .unwrap();
        let session = fx.controller.connect("10.0.0.1", |_| None).await.unwrap();

        fx.controller.edit("10.0.0.1", DeviceRecord::new("10.0.0.2")).unwrap();
        assert!(session.is_open());

        fx.controller.remove("10.0.0.2").unwrap();
        assert!(!session.is_open());
        assert_eq!(session.close_reason(), Some(CloseReason::DeviceRemoved));
        assert!(fx.controller.active_session().is_none());
    }

    #[tokio::test]
    async fn test_connect_closes_previous_session() {
        let mut fx = fixture();
        for id in ["10.0.0.1", "10.0.0.2"] {
            fx.controller.add(DeviceRecord::new(id)).unwrap();
            fx.controller
                .store_credential(id, &CredentialEntry::new("admin", "x"))
                .unwrap();
        }
        let first = fx.controller.connect("10.0.0.1", |_| None).await.unwrap();
        let second = fx.controller.connect("10.0.0.2", |_| None).await.unwrap();

        assert_eq!(first.close_reason(), Some(CloseReason::Local));
        assert!(second.is_open());
        assert_eq!(fx.controller.active_session().unwrap().device().id, "10.0.0.2");
        assert_eq!(fx.controller.selected().unwrap().id, "10.0.0.2");
    }
}
