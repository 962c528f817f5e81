//! Scripted Cisco-like device for exercising sessions without hardware.
//!
//! [`MockConnector`] plugs into [`SessionDispatcher::with_connector`] and
//! behaves like an IOS switch: it checks the credential, echoes input,
//! tracks exec/config modes, and answers a handful of show commands.
//!
//! [`SessionDispatcher::with_connector`]: super::SessionDispatcher::with_connector

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::handle::lock;
use super::transport::{ConnectOptions, Connector, Transport};
use crate::error::ConnectError;
use crate::inventory::DeviceRecord;
use crate::vault::CredentialEntry;

const DEFAULT_RUNNING_CONFIG: &str = "\
!
version 15.2
service timestamps debug datetime msec
hostname core-sw
!
interface GigabitEthernet1/0/1
 description uplink to dist-1
 switchport mode trunk
!
interface GigabitEthernet1/0/2
 description printer
 switchport access vlan 20
 shutdown
!
interface GigabitEthernet1/0/3
 switchport access vlan 1
!
interface Vlan1
 ip address 10.0.0.1 255.255.255.0
!
end";

const IP_INTERFACE_BRIEF: &str = "\
Interface              IP-Address      OK? Method Status                Protocol
Vlan1                  10.0.0.1        YES NVRAM  up                    up
GigabitEthernet1/0/1   unassigned      YES unset  up                    up
GigabitEthernet1/0/2   unassigned      YES unset  administratively down down
GigabitEthernet1/0/3   unassigned      YES unset  down                  down";

const VLAN_BRIEF: &str = "\
VLAN Name                             Status    Ports
---- -------------------------------- --------- -------------------------------
1    default                          active    Gi1/0/3, Gi1/0/4
20   printers                         active    Gi1/0/2
1002 fddi-default                     act/unsup";

/// How the mock answers a connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Log in when the credential matches.
    Accept,
    /// Refuse the connection.
    Unreachable,
    /// Answer with the wrong protocol.
    ProtocolMismatch,
    /// Stall for the given time before giving up.
    Hang(Duration),
}

/// Connector that produces scripted in-process devices.
#[derive(Debug, Clone)]
pub struct MockConnector {
    hostname: String,
    username: String,
    secret: String,
    behavior: MockBehavior,
    running_config: String,
    received: Arc<Mutex<Vec<String>>>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    /// A device that accepts exactly `username`/`secret`.
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            hostname: "core-sw".into(),
            username: username.into(),
            secret: secret.into(),
            behavior: MockBehavior::Accept,
            running_config: DEFAULT_RUNNING_CONFIG.into(),
            received: Arc::default(),
            connects: Arc::default(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_running_config(mut self, config: impl Into<String>) -> Self {
        self.running_config = config.into();
        self
    }

    /// Every command line received, across all sessions.
    pub fn received(&self) -> Vec<String> {
        lock(&self.received).clone()
    }

    /// Number of connect attempts made.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        device: &DeviceRecord,
        credential: &CredentialEntry,
        options: &ConnectOptions,
    ) -> Result<Box<dyn Transport>, ConnectError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            MockBehavior::Accept => {}
            MockBehavior::Unreachable => {
                return Err(ConnectError::Unreachable {
                    device: device.id.clone(),
                    reason: "connection refused".into(),
                })
            }
            MockBehavior::ProtocolMismatch => {
                return Err(ConnectError::ProtocolMismatch {
                    device: device.id.clone(),
                    reason: "unexpected banner".into(),
                })
            }
            MockBehavior::Hang(stall) => {
                thread::sleep(stall);
                return Err(ConnectError::Unreachable {
                    device: device.id.clone(),
                    reason: "no answer".into(),
                });
            }
        }

        if credential.username != self.username || credential.secret.expose() != self.secret {
            return Err(ConnectError::AuthFailed {
                device: device.id.clone(),
            });
        }

        let mut transport = MockTransport {
            hostname: self.hostname.clone(),
            running_config: self.running_config.clone(),
            mode: Mode::Exec,
            line: String::new(),
            out: VecDeque::new(),
            link: Link::Up,
            idle: options.poll_interval.min(Duration::from_millis(10)),
            received: self.received.clone(),
        };
        transport.emit("\r\n");
        transport.emit_prompt();
        Ok(Box::new(transport))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Exec,
    Config,
    ConfigIf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Up,
    /// Device logged us out once pending output is read.
    Eof,
    /// Connection drops once pending output is read.
    Broken,
}

struct MockTransport {
    hostname: String,
    running_config: String,
    mode: Mode,
    line: String,
    out: VecDeque<u8>,
    link: Link,
    idle: Duration,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    fn emit(&mut self, text: &str) {
        self.out.extend(text.as_bytes());
    }

    fn emit_lines(&mut self, text: &str) {
        for line in text.lines() {
            self.emit(line);
            self.emit("\r\n");
        }
    }

    fn emit_prompt(&mut self) {
        let prompt = match self.mode {
            Mode::Exec => format!("{}#", self.hostname),
            Mode::Config => format!("{}(config)#", self.hostname),
            Mode::ConfigIf => format!("{}(config-if)#", self.hostname),
        };
        self.emit(&prompt);
    }

    fn running_config(&self) -> String {
        self.running_config
            .lines()
            .map(|l| {
                if l.starts_with("hostname ") {
                    format!("hostname {}", self.hostname)
                } else {
                    l.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn show_running(&mut self, filter: Option<&str>) {
        let config = self.running_config();
        match filter {
            Some(pattern) => {
                let matched: Vec<&str> = config.lines().filter(|l| l.contains(pattern)).collect();
                self.emit_lines(&matched.join("\n"));
            }
            None => {
                self.emit_lines("Building configuration...\n");
                self.emit_lines(&format!("Current configuration : {} bytes", config.len()));
                self.emit_lines(&config);
            }
        }
    }

    fn exec(&mut self, command: &str) {
        let (base, filter) = match command.split_once(" | include ") {
            Some((base, pattern)) => (base.trim(), Some(pattern.trim())),
            None => (command, None),
        };
        match base {
            "" | "terminal length 0" | "terminal width 511" | "terminal pager 0" => {}
            "show running-config" | "show run" => self.show_running(filter),
            "show ip interface brief" => self.emit_lines(IP_INTERFACE_BRIEF),
            "show vlan brief" => self.emit_lines(VLAN_BRIEF),
            "show version" => {
                self.emit_lines("Cisco IOS Software, C2960X Software, Version 15.2(7)E")
            }
            "configure terminal" | "conf t" => {
                self.emit_lines("Enter configuration commands, one per line.  End with CNTL/Z.");
                self.mode = Mode::Config;
            }
            "exit" | "logout" | "quit" => {
                self.link = Link::Eof;
                return;
            }
            "reload" => {
                self.emit("Proceed with reload? [confirm]");
                self.link = Link::Broken;
                return;
            }
            _ => self.emit_lines("% Invalid input detected at '^' marker."),
        }
        self.emit_prompt();
    }

    fn configure(&mut self, command: &str) {
        let keyword = command.split_whitespace().next().unwrap_or("");
        match keyword {
            "end" => self.mode = Mode::Exec,
            "exit" => {
                self.mode = if self.mode == Mode::ConfigIf {
                    Mode::Config
                } else {
                    Mode::Exec
                }
            }
            "interface" => self.mode = Mode::ConfigIf,
            "hostname" => {
                if let Some(name) = command.split_whitespace().nth(1) {
                    self.hostname = name.to_string();
                }
            }
            "default" if command.starts_with("default interface ") => {
                let name = command.trim_start_matches("default interface ").trim();
                self.emit_lines(&format!("Interface {name} set to default configuration"));
            }
            _ => {}
        }
        self.emit_prompt();
    }

    fn handle_line(&mut self) {
        let command = std::mem::take(&mut self.line).trim().to_string();
        lock(&self.received).push(command.clone());
        match self.mode {
            Mode::Exec => self.exec(&command),
            Mode::Config | Mode::ConfigIf => self.configure(&command),
        }
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.out.is_empty() {
            return match self.link {
                Link::Up => {
                    thread::sleep(self.idle);
                    Err(io::ErrorKind::WouldBlock.into())
                }
                Link::Eof => Ok(0),
                Link::Broken => Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by device",
                )),
            };
        }
        let n = buf.len().min(self.out.len());
        for (slot, byte) in buf.iter_mut().zip(self.out.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        if self.link != Link::Up {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        for &byte in data {
            match byte {
                b'\r' => {}
                b'\n' => {
                    self.emit("\r\n");
                    self.handle_line();
                    if self.link != Link::Up {
                        break;
                    }
                }
                // Ctrl-Z leaves config mode.
                0x1a => {
                    self.line.clear();
                    self.mode = Mode::Exec;
                    self.emit("^Z\r\n");
                    self.emit_prompt();
                }
                b => {
                    self.line.push(b as char);
                    self.out.push_back(b);
                }
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        self.link = Link::Eof;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connect(mock: &MockConnector, secret: &str) -> Result<Box<dyn Transport>, ConnectError> {
        mock.connect(
            &DeviceRecord::new("10.0.0.1"),
            &CredentialEntry::new("admin", secret),
            &ConnectOptions::default(),
        )
    }

    fn drain(transport: &mut Box<dyn Transport>) -> String {
        let mut buf = [0u8; 8192];
        let mut text = String::new();
        loop {
            match transport.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => text.push_str(&String::from_utf8_lossy(&buf[..n])),
                Err(_) => break,
            }
        }
        text
    }

    #[test]
    fn test_rejects_wrong_secret() {
        let mock = MockConnector::new("admin", "x");
        assert!(matches!(connect(&mock, "y"), Err(ConnectError::AuthFailed { .. })));
        assert_eq!(mock.connect_count(), 1);
    }

    #[test]
    fn test_greets_with_prompt_and_echoes() {
        let mock = MockConnector::new("admin", "x");
        let mut transport = connect(&mock, "x").unwrap();
        assert_eq!(drain(&mut transport), "\r\ncore-sw#");

        transport.write_all(b"show version\n").unwrap();
        let out = drain(&mut transport);
        assert!(out.starts_with("show version\r\n"));
        assert!(out.contains("Cisco IOS Software"));
        assert!(out.ends_with("core-sw#"));
        assert_eq!(mock.received(), vec!["show version".to_string()]);
    }

    #[test]
    fn test_config_modes() {
        let mock = MockConnector::new("admin", "x");
        let mut transport = connect(&mock, "x").unwrap();
        drain(&mut transport);

        transport.write_all(b"configure terminal\n").unwrap();
        assert!(drain(&mut transport).ends_with("core-sw(config)#"));
        transport.write_all(b"interface Gi1/0/2\n").unwrap();
        assert!(drain(&mut transport).ends_with("core-sw(config-if)#"));
        transport.write_all(b"end\n").unwrap();
        assert!(drain(&mut transport).ends_with("core-sw#"));
    }

    #[test]
    fn test_hostname_change_shows_in_running_config() {
        let mock = MockConnector::new("admin", "x");
        let mut transport = connect(&mock, "x").unwrap();
        transport.write_all(b"conf t\nhostname edge-sw\nend\n").unwrap();
        assert!(drain(&mut transport).ends_with("edge-sw#"));
        transport.write_all(b"show run | include hostname\n").unwrap();
        assert!(drain(&mut transport).contains("hostname edge-sw\r\n"));
    }

    #[test]
    fn test_exit_ends_stream() {
        let mock = MockConnector::new("admin", "x");
        let mut transport = connect(&mock, "x").unwrap();
        drain(&mut transport);
        transport.write_all(b"exit\n").unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(transport.read(&mut buf).unwrap(), "exit\r\n".len());
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_failure_behaviors() {
        let mock = MockConnector::new("admin", "x").with_behavior(MockBehavior::Unreachable);
        assert!(matches!(connect(&mock, "x"), Err(ConnectError::Unreachable { .. })));
        let mock = mock.with_behavior(MockBehavior::ProtocolMismatch);
        assert!(matches!(connect(&mock, "x"), Err(ConnectError::ProtocolMismatch { .. })));
    }
}
