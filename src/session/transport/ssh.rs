//! SSH transport over libssh2.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use ssh2::{Channel, ErrorCode, Session};
use tracing::{debug, trace};

use super::{dial, is_idle, ConnectOptions, Connector, Transport};
use crate::error::ConnectError;
use crate::inventory::DeviceRecord;
use crate::vault::CredentialEntry;

/// libssh2 `LIBSSH2_ERROR_TIMEOUT`.
const ERROR_TIMEOUT: i32 = -9;

const WRITE_BUDGET: Duration = Duration::from_secs(10);
const SHUTDOWN_TIMEOUT_MS: u32 = 500;

/// Password-authenticated interactive SSH shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

impl Connector for SshConnector {
    fn connect(
        &self,
        device: &DeviceRecord,
        credential: &CredentialEntry,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Transport>, ConnectError> {
        let started = Instant::now();
        let tcp = dial(device, options.timeout)?;
        let remaining = options.timeout.saturating_sub(started.elapsed());

        let timed_out = || ConnectError::Timeout {
            device: device.id.clone(),
            after: options.timeout,
        };
        let is_timeout = |e: &ssh2::Error| e.code() == ErrorCode::Session(ERROR_TIMEOUT);

        let mut session = Session::new().map_err(|e| ConnectError::ProtocolMismatch {
            device: device.id.clone(),
            reason: e.to_string(),
        })?;
        session.set_tcp_stream(tcp);
        session.set_timeout(millis(remaining));

        session.handshake().map_err(|e| {
            if is_timeout(&e) {
                timed_out()
            } else {
                ConnectError::ProtocolMismatch {
                    device: device.id.clone(),
                    reason: e.message().to_string(),
                }
            }
        })?;
        debug!(device = %device.id, "ssh handshake complete");

        session
            .userauth_password(&credential.username, credential.secret.expose())
            .map_err(|e| {
                if is_timeout(&e) {
                    timed_out()
                } else {
                    ConnectError::AuthFailed {
                        device: device.id.clone(),
                    }
                }
            })?;
        if !session.authenticated() {
            return Err(ConnectError::AuthFailed {
                device: device.id.clone(),
            });
        }

        let shell_error = |e: ssh2::Error| {
            if is_timeout(&e) {
                timed_out()
            } else {
                ConnectError::ProtocolMismatch {
                    device: device.id.clone(),
                    reason: format!("shell request refused: {}", e.message()),
                }
            }
        };
        let mut channel = session.channel_session().map_err(shell_error)?;
        channel
            .request_pty(
                "vt100",
                None,
                Some((options.term_cols, options.term_rows, 0, 0)),
            )
            .map_err(shell_error)?;
        channel.shell().map_err(shell_error)?;

        session.set_timeout(millis(options.poll_interval));
        debug!(device = %device.id, "ssh shell open");

        Ok(Box::new(SshTransport { session, channel }))
    }
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX).max(1)
}

struct SshTransport {
    session: Session,
    channel: Channel,
}

impl Transport for SshTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.channel.read(buf) {
            // libssh2 reports an empty read before the channel is really at EOF.
            Ok(0) if !self.channel.eof() => Err(io::ErrorKind::WouldBlock.into()),
            other => other,
        }
    }

    fn write_all(&mut self, mut data: &[u8]) -> io::Result<()> {
        let deadline = Instant::now() + WRITE_BUDGET;
        while !data.is_empty() {
            match self.channel.write(data) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => data = &data[n..],
                Err(e) if is_idle(&e) && Instant::now() < deadline => {
                    trace!("ssh write stalled, retrying");
                }
                Err(e) => return Err(e),
            }
        }
        self.channel.flush()
    }

    fn shutdown(&mut self) {
        self.session.set_timeout(SHUTDOWN_TIMEOUT_MS);
        let _ = self.channel.send_eof();
        let _ = self.channel.close();
        let _ = self.session.disconnect(None, "session closed", None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::net::TcpListener;
    use std::thread;

    fn local_device(port: u16) -> DeviceRecord {
        DeviceRecord::new("127.0.0.1").with_port(port)
    }

    #[test]
    fn test_millis_clamps() {
        assert_eq!(millis(Duration::ZERO), 1);
        assert_eq!(millis(Duration::from_millis(250)), 250);
        assert_eq!(millis(Duration::from_secs(u64::MAX)), u32::MAX);
    }

    #[test]
    fn test_non_ssh_peer_is_protocol_mismatch() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = stream.write_all(b"\r\nUser Access Verification\r\n\r\nUsername: ");
            thread::sleep(Duration::from_millis(300));
        });

        let options = ConnectOptions {
            timeout: Duration::from_secs(5),
            ..ConnectOptions::default()
        };
        let result = SshConnector.connect(
            &local_device(port),
            &CredentialEntry::new("admin", "x"),
            &options,
        );
        match result {
            Err(ConnectError::ProtocolMismatch { device, .. }) => assert_eq!(device, "127.0.0.1"),
            Err(other) => panic!("expected protocol mismatch, got {other:?}"),
            Ok(_) => panic!("expected protocol mismatch, got a session"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_silent_peer_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(1500));
        });

        let options = ConnectOptions {
            timeout: Duration::from_millis(400),
            ..ConnectOptions::default()
        };
        let result = SshConnector.connect(
            &local_device(port),
            &CredentialEntry::new("admin", "x"),
            &options,
        );
        assert!(matches!(result, Err(ConnectError::Timeout { .. })));
        server.join().unwrap();
    }
}
