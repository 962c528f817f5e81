//! Device record type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Dialect tag assumed when a record does not carry one.
pub const DEFAULT_DEVICE_TYPE: &str = "cisco_ios";

/// Remote management transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Ssh,
    Telnet,
}

impl Transport {
    /// Well-known port for the transport.
    pub fn default_port(&self) -> u16 {
        match self {
            Transport::Ssh => 22,
            Transport::Telnet => 23,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Ssh => "ssh",
            Transport::Telnet => "telnet",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ssh" => Ok(Transport::Ssh),
            "telnet" => Ok(Transport::Telnet),
            other => Err(format!("unknown transport '{other}' (expected ssh or telnet)")),
        }
    }
}

fn default_device_type() -> String {
    DEFAULT_DEVICE_TYPE.to_string()
}

/// A stored description of a manageable network device.
///
/// `id` is the hostname or address used to reach the device and is unique
/// within an inventory. Field order here is the on-disk field order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Unique identifier; also the address dialled.
    #[serde(alias = "ip")]
    pub id: String,
    /// Display name, may be empty.
    #[serde(default)]
    pub name: String,
    /// Command dialect tag, e.g. `cisco_ios`.
    #[serde(default = "default_device_type")]
    pub device_type: String,
    /// Transport preference.
    #[serde(default)]
    pub transport: Transport,
    /// Port override; the transport default is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl DeviceRecord {
    /// Create an SSH `cisco_ios` record with an empty name.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            device_type: default_device_type(),
            transport: Transport::default(),
            port: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_device_type(mut self, device_type: impl Into<String>) -> Self {
        self.device_type = device_type.into();
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Port to dial: the override, or the transport default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.transport.default_port())
    }

    /// `id (name)`, or just `id` when unnamed.
    pub fn display_label(&self) -> String {
        if self.name.is_empty() {
            self.id.clone()
        } else {
            format!("{} ({})", self.id, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let record = DeviceRecord::new("10.0.0.1");
        assert_eq!(record.device_type, "cisco_ios");
        assert_eq!(record.transport, Transport::Ssh);
        assert_eq!(record.effective_port(), 22);
    }

    #[test]
    fn test_effective_port_override() {
        let record = DeviceRecord::new("10.0.0.1")
            .with_transport(Transport::Telnet)
            .with_port(2323);
        assert_eq!(record.effective_port(), 2323);
        assert_eq!(
            DeviceRecord::new("x")
                .with_transport(Transport::Telnet)
                .effective_port(),
            23
        );
    }

    #[test]
    fn test_display_label() {
        assert_eq!(DeviceRecord::new("10.0.0.1").display_label(), "10.0.0.1");
        assert_eq!(
            DeviceRecord::new("10.0.0.1")
                .with_name("core-sw")
                .display_label(),
            "10.0.0.1 (core-sw)"
        );
    }

    #[test]
    fn test_transport_parse() {
        assert_eq!("SSH".parse::<Transport>().unwrap(), Transport::Ssh);
        assert_eq!("telnet".parse::<Transport>().unwrap(), Transport::Telnet);
        assert!("rlogin".parse::<Transport>().is_err());
    }

    #[test]
    fn test_deserialize_legacy_ip_key() {
        let record: DeviceRecord =
            serde_json::from_str(r#"{"ip": "10.0.0.2", "name": "edge"}"#).unwrap();
        assert_eq!(record.id, "10.0.0.2");
        assert_eq!(record.name, "edge");
        assert_eq!(record.device_type, "cisco_ios");
        assert_eq!(record.transport, Transport::Ssh);
        assert_eq!(record.port, None);
    }

    #[test]
    fn test_port_omitted_when_unset() {
        let json = serde_json::to_string(&DeviceRecord::new("10.0.0.1")).unwrap();
        assert!(!json.contains("port"));
        assert!(json.contains("\"transport\":\"ssh\""));
    }
}
