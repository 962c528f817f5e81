//! Configuration management for netdeck.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::session::SessionSettings;
use crate::templates::DEFAULT_TEMPLATE_DIR;
use crate::vault::VaultBackend;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub inventory: InventorySection,
    pub vault: VaultSection,
    pub session: SessionSection,
    pub backups: BackupSection,
    pub templates: TemplateSection,
    pub logging: LoggingSection,
}

/// Inventory file location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySection {
    pub path: PathBuf,
}

impl Default for InventorySection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/switches.json"),
        }
    }
}

/// Credential store selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    /// `keyring` or `memory`.
    pub backend: String,
    /// Service name entries are filed under in the OS keyring.
    pub service: String,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            backend: VaultBackend::Keyring.to_string(),
            service: "netdeck".to_string(),
        }
    }
}

/// Connection and session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// Bytes of output kept per session.
    pub transcript_limit: usize,
    pub term_cols: u32,
    pub term_rows: u32,
}

impl Default for SessionSection {
    fn default() -> Self {
        let settings = SessionSettings::default();
        Self {
            connect_timeout_secs: 10,
            command_timeout_secs: settings.command_timeout.as_secs(),
            poll_interval_ms: settings.poll_interval.as_millis() as u64,
            transcript_limit: settings.transcript_limit,
            term_cols: settings.term_cols,
            term_rows: settings.term_rows,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSection {
    pub dir: PathBuf,
}

impl Default for BackupSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("backups"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateSection {
    pub dir: PathBuf,
}

impl Default for TemplateSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    fn apply_env_from<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = var("NETDECK_INVENTORY").filter(|p| !p.is_empty()) {
            self.inventory.path = PathBuf::from(path);
        }

        if let Some(backend) = var("NETDECK_VAULT") {
            self.vault.backend = backend;
        }

        if let Some(secs) = var("NETDECK_CONNECT_TIMEOUT") {
            if let Ok(secs) = secs.parse() {
                self.session.connect_timeout_secs = secs;
            }
        }

        if let Some(level) = var("NETDECK_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref path) = args.inventory {
            self.inventory.path = path.clone();
        }

        if let Some(backend) = args.vault {
            self.vault.backend = backend.to_string();
        }

        if let Some(secs) = args.timeout {
            self.session.connect_timeout_secs = secs;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env();
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Reject values that cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.vault_backend()?;
        if self.session.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "session.connect_timeout_secs",
                "0".into(),
            ));
        }
        if self.session.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "session.poll_interval_ms",
                "0".into(),
            ));
        }
        Ok(())
    }

    pub fn vault_backend(&self) -> Result<VaultBackend, ConfigError> {
        self.vault
            .backend
            .parse()
            .map_err(|_| ConfigError::InvalidValue("vault.backend", self.vault.backend.clone()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.session.connect_timeout_secs)
    }

    /// Session tuning for the dispatcher.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(self.session.poll_interval_ms),
            command_timeout: Duration::from_secs(self.session.command_timeout_secs),
            transcript_limit: self.session.transcript_limit,
            term_cols: self.session.term_cols,
            term_rows: self.session.term_rows,
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A setting holds an unusable value.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(key, value) => write!(f, "invalid value for {}: '{}'", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}
