//! Error types for netdeck.
//!
//! Every failure is scoped to the action that triggered it. Messages never
//! carry credential values.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Inventory file could not be read or written.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The inventory file exists but could not be read.
    #[error("failed to read inventory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The inventory file could not be written.
    #[error("failed to write inventory {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The inventory file is not valid inventory JSON.
    #[error("malformed inventory {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The inventory file lists the same device twice.
    #[error("inventory {path} lists device {id} more than once")]
    DuplicateId { path: PathBuf, id: String },
}

/// Secure credential store failure.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The platform secure store cannot be reached.
    #[error("credential store unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the operation.
    #[error("credential store error: {0}")]
    Backend(String),
}

/// Reasons a session could not be opened.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The device rejected the credentials.
    #[error("authentication failed for {device}")]
    AuthFailed { device: String },

    /// The device could not be reached at all.
    #[error("{device} is unreachable: {reason}")]
    Unreachable { device: String, reason: String },

    /// The device answered, but not in the expected protocol.
    #[error("protocol mismatch with {device}: {reason}")]
    ProtocolMismatch { device: String, reason: String },

    /// The connect attempt did not finish in time.
    #[error("connection to {device} timed out after {after:?}")]
    Timeout { device: String, after: Duration },
}

impl ConnectError {
    /// Identifier of the device the attempt was made against.
    pub fn device(&self) -> &str {
        match self {
            Self::AuthFailed { device }
            | Self::Unreachable { device, .. }
            | Self::ProtocolMismatch { device, .. }
            | Self::Timeout { device, .. } => device,
        }
    }
}

/// Failures on an already open session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session has been closed.
    #[error("session {0} is closed")]
    Closed(String),

    /// The device did not return to its prompt in time.
    #[error("no prompt from device after {0:?}")]
    CommandTimeout(Duration),
}

/// Configuration template store failure.
#[derive(Error, Debug)]
pub enum TemplateError {
    /// Template paths must be relative and stay inside the template root.
    #[error("invalid template path: {0}")]
    InvalidPath(String),

    /// No template or directory at the given path.
    #[error("template not found: {0}")]
    NotFound(String),

    /// Underlying filesystem error.
    #[error("template I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Main error type for netdeck operations.
#[derive(Error, Debug)]
pub enum NetdeckError {
    /// Inventory store error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Credential vault error.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Session could not be opened.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Open session error.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Template store error.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// No device with the given identifier.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A device with the given identifier already exists.
    #[error("device already exists: {0}")]
    DuplicateDevice(String),

    /// A device record failed validation.
    #[error("invalid device: {0}")]
    InvalidDevice(String),

    /// No credential stored and none supplied.
    #[error("no credential for {0}")]
    CredentialMissing(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for netdeck operations.
pub type Result<T> = std::result::Result<T, NetdeckError>;
