//! Telnet transport with a minimal option negotiator and login driver.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::{dial, is_idle, ConnectOptions, Connector, Transport};
use crate::error::ConnectError;
use crate::inventory::DeviceRecord;
use crate::session::dialect::{is_prompt, last_line};
use crate::vault::CredentialEntry;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

const LOGIN_POLL: Duration = Duration::from_millis(100);

const REJECTION_MARKERS: &[&str] = &[
    "authentication failed",
    "login invalid",
    "login incorrect",
    "access denied",
    "% bad passwords",
    "% bad secrets",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CodecState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Separates data from IAC sequences and answers option requests.
///
/// The device may enable ECHO and SGA on its side. Every option we are
/// asked to enable is refused.
#[derive(Debug, Default)]
pub(crate) struct TelnetCodec {
    state: CodecState,
}

impl TelnetCodec {
    /// Feed raw bytes. Payload goes to `data`, negotiation answers to `replies`.
    pub fn decode(&mut self, input: &[u8], data: &mut Vec<u8>, replies: &mut Vec<u8>) {
        for &byte in input {
            self.state = match (self.state, byte) {
                (CodecState::Data, IAC) => CodecState::Iac,
                (CodecState::Data, 0) => CodecState::Data,
                (CodecState::Data, b) => {
                    data.push(b);
                    CodecState::Data
                }
                (CodecState::Iac, IAC) => {
                    data.push(IAC);
                    CodecState::Data
                }
                (CodecState::Iac, cmd @ (DO | DONT | WILL | WONT)) => CodecState::Negotiate(cmd),
                (CodecState::Iac, SB) => CodecState::Sub,
                (CodecState::Iac, _) => CodecState::Data,
                (CodecState::Negotiate(cmd), option) => {
                    if let Some(reply) = answer(cmd, option) {
                        replies.extend_from_slice(&[IAC, reply, option]);
                    }
                    CodecState::Data
                }
                (CodecState::Sub, IAC) => CodecState::SubIac,
                (CodecState::Sub, _) => CodecState::Sub,
                (CodecState::SubIac, SE) => CodecState::Data,
                (CodecState::SubIac, _) => CodecState::Sub,
            };
        }
    }

    /// Escape outgoing payload and send line ends as CR LF.
    pub fn encode(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(input.len() + 2);
        let mut prev = 0u8;
        for &byte in input {
            match byte {
                IAC => out.extend_from_slice(&[IAC, IAC]),
                b'\n' if prev != b'\r' => out.extend_from_slice(b"\r\n"),
                b => out.push(b),
            }
            prev = byte;
        }
        out
    }
}

fn answer(cmd: u8, option: u8) -> Option<u8> {
    match cmd {
        DO => Some(WONT),
        WILL if option == OPT_ECHO || option == OPT_SGA => Some(DO),
        WILL => Some(DONT),
        // Acknowledging DONT/WONT would loop with some peers.
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginEvent {
    Username,
    Password,
    Prompt,
    Rejected,
    SshBanner,
}

/// `answered` is set once a login line has gone out; before that, text
/// like "access denied" is only banner.
fn classify(text: &str, answered: bool) -> Option<LoginEvent> {
    if text.trim_start().starts_with("SSH-") {
        return Some(LoginEvent::SshBanner);
    }
    let lower = text.to_ascii_lowercase();
    if answered && REJECTION_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some(LoginEvent::Rejected);
    }
    let tail = last_line(&lower).trim();
    if tail.ends_with("username:") || tail.ends_with("login:") {
        Some(LoginEvent::Username)
    } else if tail.ends_with("password:") {
        Some(LoginEvent::Password)
    } else if is_prompt(last_line(text)) {
        Some(LoginEvent::Prompt)
    } else {
        None
    }
}

enum LoginStop {
    Eof,
    Deadline,
    Io(io::Error),
}

struct LoginDriver {
    stream: TcpStream,
    codec: TelnetCodec,
    /// Payload received since the last line we sent.
    seen: Vec<u8>,
    answered: bool,
    deadline: Instant,
}

impl LoginDriver {
    fn wait(&mut self) -> Result<LoginEvent, LoginStop> {
        let mut buf = [0u8; 2048];
        loop {
            if let Some(event) = classify(&String::from_utf8_lossy(&self.seen), self.answered) {
                return Ok(event);
            }
            if Instant::now() >= self.deadline {
                return Err(LoginStop::Deadline);
            }
            match self.stream.read(&mut buf) {
                Ok(0) => return Err(LoginStop::Eof),
                Ok(n) => {
                    let mut replies = Vec::new();
                    self.codec.decode(&buf[..n], &mut self.seen, &mut replies);
                    if !replies.is_empty() {
                        self.stream.write_all(&replies).map_err(LoginStop::Io)?;
                    }
                }
                Err(e) if is_idle(&e) => continue,
                Err(e) => return Err(LoginStop::Io(e)),
            }
        }
    }

    fn send_line(&mut self, line: &str) -> Result<(), LoginStop> {
        self.seen.clear();
        self.answered = true;
        let mut payload = line.as_bytes().to_vec();
        payload.push(b'\n');
        self.stream
            .write_all(&TelnetCodec::encode(&payload))
            .map_err(LoginStop::Io)
    }
}

/// Plain-text telnet with username/password login.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelnetConnector;

impl Connector for TelnetConnector {
    fn connect(
        &self,
        device: &DeviceRecord,
        credential: &CredentialEntry,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Transport>, ConnectError> {
        let deadline = Instant::now() + options.timeout;
        let stream = dial(device, options.timeout)?;
        let _ = stream.set_nodelay(true);
        stream
            .set_read_timeout(Some(LOGIN_POLL))
            .map_err(|e| connection_lost(device, e.to_string()))?;

        let mut driver = LoginDriver {
            stream,
            codec: TelnetCodec::default(),
            seen: Vec::new(),
            answered: false,
            deadline,
        };

        let stop = |reason: LoginStop, after_password: bool| match reason {
            LoginStop::Deadline => ConnectError::Timeout {
                device: device.id.clone(),
                after: options.timeout,
            },
            LoginStop::Eof if after_password => ConnectError::AuthFailed {
                device: device.id.clone(),
            },
            LoginStop::Eof => connection_lost(device, "connection closed during login".into()),
            LoginStop::Io(e) => connection_lost(device, e.to_string()),
        };

        let mut sent_password = false;
        loop {
            let event = driver.wait().map_err(|e| stop(e, sent_password))?;
            trace!(device = %device.id, ?event, "telnet login");
            match event {
                LoginEvent::SshBanner => {
                    return Err(ConnectError::ProtocolMismatch {
                        device: device.id.clone(),
                        reason: "peer speaks SSH, not telnet".into(),
                    })
                }
                LoginEvent::Rejected => {
                    return Err(ConnectError::AuthFailed {
                        device: device.id.clone(),
                    })
                }
                LoginEvent::Username | LoginEvent::Password if sent_password => {
                    return Err(ConnectError::AuthFailed {
                        device: device.id.clone(),
                    })
                }
                LoginEvent::Username => driver
                    .send_line(&credential.username)
                    .map_err(|e| stop(e, false))?,
                LoginEvent::Password => {
                    driver
                        .send_line(credential.secret.expose())
                        .map_err(|e| stop(e, false))?;
                    sent_password = true;
                }
                LoginEvent::Prompt => break,
            }
        }

        driver
            .stream
            .set_read_timeout(Some(options.poll_interval.max(Duration::from_millis(1))))
            .map_err(|e| connection_lost(device, e.to_string()))?;
        debug!(device = %device.id, "telnet login complete");

        Ok(Box::new(TelnetTransport {
            stream: driver.stream,
            codec: driver.codec,
            pending: driver.seen,
        }))
    }
}

fn connection_lost(device: &DeviceRecord, reason: String) -> ConnectError {
    ConnectError::Unreachable {
        device: device.id.clone(),
        reason,
    }
}

struct TelnetTransport {
    stream: TcpStream,
    codec: TelnetCodec,
    /// Decoded payload not yet handed out. Starts with the login prompt.
    pending: Vec<u8>,
}

impl Transport for TelnetTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            let mut raw = [0u8; 4096];
            let n = self.stream.read(&mut raw)?;
            if n == 0 {
                return Ok(0);
            }
            let mut replies = Vec::new();
            self.codec.decode(&raw[..n], &mut self.pending, &mut replies);
            if !replies.is_empty() {
                self.stream.write_all(&replies)?;
            }
            if self.pending.is_empty() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(&TelnetCodec::encode(data))
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
