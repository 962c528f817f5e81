//! Device command dialects and prompt handling.

/// Per device-type command conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub name: &'static str,
    /// Sent once after login, e.g. to disable paging.
    pub setup_commands: &'static [&'static str],
    /// Enters configuration mode.
    pub config_enter: Option<&'static str>,
    /// Leaves configuration mode.
    pub config_exit: Option<&'static str>,
}

const IOS: Dialect = Dialect {
    name: "cisco_ios",
    setup_commands: &["terminal length 0", "terminal width 511"],
    config_enter: Some("configure terminal"),
    config_exit: Some("end"),
};

const NXOS: Dialect = Dialect {
    name: "cisco_nxos",
    setup_commands: &["terminal length 0", "terminal width 511"],
    config_enter: Some("configure terminal"),
    config_exit: Some("end"),
};

const ASA: Dialect = Dialect {
    name: "cisco_asa",
    setup_commands: &["terminal pager 0"],
    config_enter: Some("configure terminal"),
    config_exit: Some("end"),
};

const GENERIC: Dialect = Dialect {
    name: "generic",
    setup_commands: &[],
    config_enter: None,
    config_exit: None,
};

impl Dialect {
    /// Pick the dialect for a device-type tag. Unknown tags get no setup
    /// and no config-mode wrapping.
    pub fn for_device_type(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "cisco_ios" | "cisco_xe" | "cisco_ios_telnet" | "cisco_xe_telnet" => IOS,
            "cisco_nxos" => NXOS,
            "cisco_asa" => ASA,
            _ => GENERIC,
        }
    }
}

/// A device prompt: non-empty, no whitespace, ends with `#` or `>`.
///
/// Matches `core-sw#`, `core-sw>`, `core-sw(config-if)#`.
pub fn is_prompt(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.len() <= 128
        && !line.chars().any(char::is_whitespace)
        && (line.ends_with('#') || line.ends_with('>'))
}

/// Last line of `text`, ignoring trailing line breaks.
pub fn last_line(text: &str) -> &str {
    let text = text.trim_end_matches(['\r', '\n']);
    text.rsplit(['\r', '\n']).next().unwrap_or("")
}

/// Whether `text` holds at least one full line followed by a prompt.
pub fn ends_with_prompt(text: &str) -> bool {
    text.contains('\n') && is_prompt(last_line(text))
}

/// Strip the echoed command and the trailing prompt from command output.
pub fn clean_command_output(text: &str, command: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "");
    let mut lines: Vec<&str> = normalized.lines().collect();

    let command = command.trim();
    if !command.is_empty() {
        if let Some(pos) = lines.iter().position(|l| l.trim_end().ends_with(command)) {
            lines.drain(..=pos);
        }
    }

    if lines.last().is_some_and(|l| is_prompt(l)) {
        lines.pop();
    }

    lines.join("\n").trim_end().to_string()
}
