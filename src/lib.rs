//! # netdeck
//!
//! Device inventory, keyring-backed credentials and SSH/Telnet sessions
//! for network operators.
//!
//! This crate keeps an ordered list of Cisco-style devices on disk, files
//! their login credentials in the OS secure store, and opens interactive
//! management sessions to them. Blocking transport libraries run on their
//! own threads behind an async output feed.
//!
//! ## Features
//!
//! - **Inventory**: JSON device list, upgraded in place from the legacy format
//! - **Credentials**: OS keyring backend, never written to the inventory
//! - **Sessions**: SSH (libssh2) and Telnet, prompt-aware command exchange
//! - **IOS helpers**: interface search, `interface range`, backups, templates
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use netdeck::{DeviceController, DeviceRecord, InventoryStore, MemoryVault, SessionDispatcher};
//!
//! #[tokio::main]
//! async fn main() -> netdeck::Result<()> {
//!     netdeck::logging::try_init(None).ok();
//!
//!     let mut controller = DeviceController::new(
//!         InventoryStore::new("config/switches.json"),
//!         Arc::new(MemoryVault::new()),
//!         SessionDispatcher::default(),
//!     );
//!     controller.load()?;
//!     controller.add(DeviceRecord::new("10.0.0.1").with_name("core-sw"))?;
//!
//!     let session = controller
//!         .connect("10.0.0.1", |_| Some(netdeck::CredentialEntry::new("admin", "secret")))
//!         .await?;
//!     let version = session
//!         .send_command("show version", std::time::Duration::from_secs(10))
//!         .await?;
//!     println!("{version}");
//!     Ok(())
//! }
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod inventory;
pub mod ios;
pub mod logging;
pub mod output;
pub mod session;
pub mod shell;
pub mod templates;
pub mod vault;

// Re-export commonly used types
pub use controller::DeviceController;
pub use error::{
    ConnectError, NetdeckError, Result, SessionError, StorageError, TemplateError, VaultError,
};
pub use inventory::{DeviceRecord, InventoryStore, Transport};
pub use output::{AnsiStripper, OutputSanitizer};
pub use session::{
    CloseReason, Connector, OutputFeed, Session, SessionDispatcher, SessionId, SessionSettings,
    SessionState,
};
pub use shell::ShellView;
pub use templates::{TemplateEntry, TemplateStore};
pub use vault::{
    open_vault, CredentialEntry, CredentialVault, KeyringVault, MemoryVault, Secret, VaultBackend,
};
