//! Opens sessions over the transport a device record names.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::handle::{Session, Shared};
use super::pump::SessionPump;
use super::transport::{ConnectOptions, Connector, SshConnector, TelnetConnector};
use crate::error::ConnectError;
use crate::inventory::{DeviceRecord, Transport};
use crate::vault::CredentialEntry;

/// Session tuning shared by every connection.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Upper bound on one idle read in the pump.
    pub poll_interval: Duration,
    /// How long setup and helper commands wait for a prompt.
    pub command_timeout: Duration,
    /// Bytes of output retained per session.
    pub transcript_limit: usize,
    pub term_cols: u32,
    pub term_rows: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            command_timeout: Duration::from_secs(30),
            transcript_limit: 256 * 1024,
            term_cols: 120,
            term_rows: 40,
        }
    }
}

/// Picks a connector per transport and turns connections into sessions.
#[derive(Clone)]
pub struct SessionDispatcher {
    ssh: Arc<dyn Connector>,
    telnet: Arc<dyn Connector>,
    settings: SessionSettings,
}

impl SessionDispatcher {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            ssh: Arc::new(SshConnector),
            telnet: Arc::new(TelnetConnector),
            settings,
        }
    }

    /// Replace the connector used for one transport.
    pub fn with_connector(mut self, transport: Transport, connector: Arc<dyn Connector>) -> Self {
        match transport {
            Transport::Ssh => self.ssh = connector,
            Transport::Telnet => self.telnet = connector,
        }
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Connect and log in to `device`.
    ///
    /// The whole attempt is bounded by `timeout`; running out always
    /// yields [`ConnectError::Timeout`]. On success the dialect's setup
    /// commands have been sent and the session is open.
    pub async fn open(
        &self,
        device: &DeviceRecord,
        credential: &CredentialEntry,
        timeout: Duration,
    ) -> Result<Session, ConnectError> {
        let connector = match device.transport {
            Transport::Ssh => self.ssh.clone(),
            Transport::Telnet => self.telnet.clone(),
        };
        let options = ConnectOptions {
            timeout,
            poll_interval: self.settings.poll_interval,
            term_cols: self.settings.term_cols,
            term_rows: self.settings.term_rows,
        };

        info!(
            device = %device.id,
            transport = %device.transport,
            port = device.effective_port(),
            "connecting"
        );

        let attempt = {
            let device = device.clone();
            let credential = credential.clone();
            tokio::task::spawn_blocking(move || connector.connect(&device, &credential, &options))
        };
        let result = match tokio::time::timeout(timeout, attempt).await {
            Err(_) => Err(ConnectError::Timeout {
                device: device.id.clone(),
                after: timeout,
            }),
            Ok(Err(join_error)) => Err(ConnectError::Unreachable {
                device: device.id.clone(),
                reason: format!("connect task failed: {join_error}"),
            }),
            Ok(Ok(result)) => result,
        };
        let transport = match result {
            Ok(transport) => transport,
            Err(e) => {
                warn!(device = %device.id, error = %e, "connect failed");
                return Err(e);
            }
        };

        let (shared, input) = Shared::new(device.clone(), self.settings.transcript_limit);
        SessionPump::new(transport, shared.clone(), input)
            .spawn()
            .map_err(|e| ConnectError::Unreachable {
                device: device.id.clone(),
                reason: format!("cannot start session thread: {e}"),
            })?;
        shared.mark_open();
        let session = Session::new(shared);
        info!(session = %session.id(), device = %device.id, "session open");

        let setup_timeout = timeout.min(self.settings.command_timeout);
        for command in session.dialect().setup_commands {
            match session.send_command(command, setup_timeout).await {
                Ok(_) => debug!(session = %session.id(), command, "setup command done"),
                Err(e) => {
                    warn!(session = %session.id(), command, error = %e, "setup command failed");
                    break;
                }
            }
        }

        Ok(session)
    }
}

impl Default for SessionDispatcher {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}
