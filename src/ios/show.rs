//! Parsers for `show` command tables.

use std::fmt;

/// Line status column of `show ip interface brief`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Up,
    Down,
    AdminDown,
    Unknown,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::AdminDown => "administratively down",
            Self::Unknown => "unknown",
        })
    }
}

/// One row of `show ip interface brief`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub name: String,
    pub ip_address: String,
    pub status: LinkStatus,
    pub protocol: String,
}

/// Parse `show ip interface brief` output. Header and short lines are skipped.
pub fn parse_ip_interface_brief(output: &str) -> Vec<InterfaceStatus> {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with("Interface"))
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 6 {
                return None;
            }
            let status = if line.contains("administratively down") {
                LinkStatus::AdminDown
            } else {
                match columns[4] {
                    "down" => LinkStatus::Down,
                    "up" => LinkStatus::Up,
                    _ => LinkStatus::Unknown,
                }
            };
            Some(InterfaceStatus {
                name: columns[0].to_string(),
                ip_address: columns[1].to_string(),
                status,
                protocol: columns[columns.len() - 1].to_string(),
            })
        })
        .collect()
}

/// One row of `show vlan brief`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vlan {
    pub id: u16,
    pub name: String,
    pub status: String,
    pub ports: Vec<String>,
}

/// Parse `show vlan brief` output. Only rows starting with a VLAN number
/// are read; port continuation lines are not joined.
pub fn parse_vlan_brief(output: &str) -> Vec<Vlan> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let id = columns.next()?.parse().ok()?;
            let name = columns.next()?.to_string();
            let status = columns.next().unwrap_or_default().to_string();
            let ports = columns
                .map(|p| p.trim_end_matches(',').to_string())
                .filter(|p| !p.is_empty())
                .collect();
            Some(Vlan {
                id,
                name,
                status,
                ports,
            })
        })
        .collect()
}

/// Hostname from a `hostname X` line of a running configuration.
pub fn parse_hostname(config: &str) -> Option<String> {
    config.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("hostname"), Some(name)) => Some(name.to_string()),
            _ => None,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRIEF: &str = "\
Interface              IP-Address      OK? Method Status                Protocol
Vlan1                  10.0.0.1        YES NVRAM  up                    up
GigabitEthernet1/0/2   unassigned      YES unset  administratively down down
GigabitEthernet1/0/3   unassigned      YES unset  down                  down
Tunnel0                unassigned      YES unset  deleted               down
garbage line";

    #[test]
    fn test_parse_ip_interface_brief() {
        let rows = parse_ip_interface_brief(BRIEF);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].name, "Vlan1");
        assert_eq!(rows[0].ip_address, "10.0.0.1");
        assert_eq!(rows[0].status, LinkStatus::Up);
        assert_eq!(rows[1].status, LinkStatus::AdminDown);
        assert_eq!(rows[1].protocol, "down");
        assert_eq!(rows[2].status, LinkStatus::Down);
        assert_eq!(rows[3].status, LinkStatus::Unknown);
    }

    #[test]
    fn test_parse_vlan_brief() {
        let vlans = parse_vlan_brief(
            "VLAN Name                             Status    Ports\n\
             ---- -------------------------------- --------- -------\n\
             1    default                          active    Gi1/0/3, Gi1/0/4\n\
             20   printers                         active    Gi1/0/2\n\
             1002 fddi-default                     act/unsup\n",
        );
        assert_eq!(vlans.len(), 3);
        assert_eq!(vlans[0].ports, vec!["Gi1/0/3", "Gi1/0/4"]);
        assert_eq!(vlans[1].id, 20);
        assert_eq!(vlans[1].name, "printers");
        assert!(vlans[2].ports.is_empty());
        assert_eq!(vlans[2].status, "act/unsup");
    }

    #[test]
    fn test_parse_hostname() {
        assert_eq!(
            parse_hostname("!\nversion 15.2\nhostname core-sw\n!").as_deref(),
            Some("core-sw")
        );
        assert_eq!(parse_hostname("no hostname here"), None);
    }
}
