//! Blocking byte transports to a device.
//!
//! A [`Connector`] performs connect and login. On success it hands back a
//! [`Transport`] whose reads return within the configured poll interval,
//! so the session pump can interleave reads, writes, and close checks on
//! a single thread.

mod ssh;
mod telnet;

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

pub use ssh::SshConnector;
pub use telnet::TelnetConnector;

use crate::error::ConnectError;
use crate::inventory::DeviceRecord;
use crate::vault::CredentialEntry;

/// Parameters shared by every connect attempt.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Budget for connect plus login.
    pub timeout: Duration,
    /// Upper bound for a single idle read once the session is open.
    pub poll_interval: Duration,
    pub term_cols: u32,
    pub term_rows: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            term_cols: 120,
            term_rows: 40,
        }
    }
}

/// An authenticated interactive channel.
pub trait Transport: Send {
    /// Read device output. `Ok(0)` is end of stream. `WouldBlock` or
    /// `TimedOut` means nothing arrived within the poll interval.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all bytes to the device.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Release the channel. Must not block for long.
    fn shutdown(&mut self);
}

/// Establishes authenticated transports. Called on a blocking thread.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        device: &DeviceRecord,
        credential: &CredentialEntry,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Transport>, ConnectError>;
}

/// Whether a read error only means "no data yet".
pub fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}

pub(crate) fn resolve(device: &DeviceRecord) -> Result<SocketAddr, ConnectError> {
    let port = device.effective_port();
    let host = device.id.trim_start_matches('[').trim_end_matches(']');
    (host, port)
        .to_socket_addrs()
        .map_err(|e| ConnectError::Unreachable {
            device: device.id.clone(),
            reason: format!("cannot resolve {host}: {e}"),
        })?
        .next()
        .ok_or_else(|| ConnectError::Unreachable {
            device: device.id.clone(),
            reason: format!("no address for {host}"),
        })
}

/// Open a TCP connection within `timeout`.
pub(crate) fn dial(device: &DeviceRecord, timeout: Duration) -> Result<TcpStream, ConnectError> {
    let addr = resolve(device)?;
    TcpStream::connect_timeout(&addr, timeout).map_err(|e| match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectError::Timeout {
            device: device.id.clone(),
            after: timeout,
        },
        _ => ConnectError::Unreachable {
            device: device.id.clone(),
            reason: e.to_string(),
        },
    })
}

/// Incremental UTF-8 decoder that holds back split multi-byte sequences.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Decode as much of `bytes` as forms complete characters. Invalid
    /// sequences become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush whatever is still held back.
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }
}
