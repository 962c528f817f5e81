//! Interface blocks, search, and `interface range` construction.

use std::fmt;

/// Abbreviations expanded when parsing interface names.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Gi", "GigabitEthernet"),
    ("Fa", "FastEthernet"),
    ("Et", "Ethernet"),
    ("Se", "Serial"),
    ("Lo", "Loopback"),
    ("Vl", "Vlan"),
    ("Tu", "Tunnel"),
];

/// One `interface ...` section of a running configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceBlock {
    pub name: String,
    /// The block including its `interface` line.
    pub text: String,
}

/// Split a running configuration into interface blocks, in order.
///
/// A block runs from its `interface` line until the next unindented line.
pub fn parse_interface_blocks(config: &str) -> Vec<InterfaceBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in config.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(name) = line.strip_prefix("interface ") {
            if let Some((name, lines)) = current.take() {
                blocks.push(InterfaceBlock { name, text: lines.join("\n") });
            }
            current = Some((name.trim().to_string(), vec![line]));
        } else if let Some((_, lines)) = current.as_mut() {
            let top_level = !line.trim().is_empty() && !line.starts_with([' ', '\t']);
            if top_level {
                if let Some((name, lines)) = current.take() {
                    blocks.push(InterfaceBlock { name, text: lines.join("\n") });
                }
            } else {
                lines.push(line);
            }
        }
    }
    if let Some((name, lines)) = current {
        blocks.push(InterfaceBlock { name, text: lines.join("\n") });
    }
    blocks
}

/// Whether matching interfaces must contain or lack the search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Include,
    Exclude,
}

/// Names of interfaces whose block does (or does not) contain `term`.
///
/// Matching is case-insensitive on the trimmed term.
pub fn search_interfaces(config: &str, term: &str, mode: SearchMode) -> Vec<String> {
    let term = term.trim().to_lowercase();
    parse_interface_blocks(config)
        .into_iter()
        .filter(|block| {
            let found = block.text.to_lowercase().contains(&term);
            match mode {
                SearchMode::Include => found,
                SearchMode::Exclude => !found,
            }
        })
        .map(|block| block.name)
        .collect()
}

/// Interface name split into type, module path, and port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceName {
    /// Full type name, e.g. `GigabitEthernet`.
    pub kind: String,
    /// Everything before the last number, e.g. `1/0`. Empty for `Vlan10`.
    pub module: String,
    pub port: u32,
}

impl fmt::Display for InterfaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{}{}", self.kind, self.port)
        } else {
            write!(f, "{}{}/{}", self.kind, self.module, self.port)
        }
    }
}

/// Parse `Gi1/0/1` into `("GigabitEthernet", "1/0", 1)`.
///
/// Returns `None` for names that are not a type followed by
/// slash-separated numbers.
pub fn parse_interface_name(name: &str) -> Option<InterfaceName> {
    let name = name.trim();
    let split = name.find(|c: char| c.is_ascii_digit())?;
    let (kind, numbers) = name.split_at(split);
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
        return None;
    }
    let parts: Vec<&str> = numbers.split('/').collect();
    if parts
        .iter()
        .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    let (last, module) = parts.split_last()?;
    let port = last.parse().ok()?;

    let kind = ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == kind)
        .map_or(kind, |(_, full)| *full);

    Some(InterfaceName {
        kind: kind.to_string(),
        module: module.join("/"),
        port,
    })
}

/// Build the command that enters configuration for `names`.
///
/// One name gives `interface <name>`. Several give `interface range`,
/// with contiguous ports of the same type and module collapsed into
/// `start-end`, groups in first-seen order. Names that do not parse are
/// passed through unchanged.
pub fn interface_range_command<S: AsRef<str>>(names: &[S]) -> Option<String> {
    match names {
        [] => None,
        [single] => Some(format!("interface {}", single.as_ref().trim())),
        _ => {
            let mut groups: Vec<((String, String), Vec<u32>)> = Vec::new();
            let mut literal = Vec::new();
            for name in names {
                match parse_interface_name(name.as_ref()) {
                    Some(parsed) => {
                        let key = (parsed.kind, parsed.module);
                        match groups.iter_mut().find(|(k, _)| *k == key) {
                            Some((_, ports)) => ports.push(parsed.port),
                            None => groups.push((key, vec![parsed.port])),
                        }
                    }
                    None => literal.push(name.as_ref().trim().to_string()),
                }
            }

            let mut parts = Vec::new();
            for ((kind, module), mut ports) in groups {
                ports.sort_unstable();
                ports.dedup();
                let prefix = if module.is_empty() {
                    kind
                } else {
                    format!("{kind}{module}/")
                };
                for (start, end) in contiguous_runs(&ports) {
                    if start == end {
                        parts.push(format!("{prefix}{start}"));
                    } else {
                        parts.push(format!("{prefix}{start}-{end}"));
                    }
                }
            }
            parts.extend(literal);
            Some(format!("interface range {}", parts.join(", ")))
        }
    }
}

fn contiguous_runs(sorted: &[u32]) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    for &port in sorted {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == port => *end = port,
            _ => runs.push((port, port)),
        }
    }
    runs
}
