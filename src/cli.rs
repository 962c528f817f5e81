//! Command-line interface for netdeck.
//!
//! Uses lexopt: global options may appear anywhere, the first positional
//! word selects the command and the rest are its operands.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::inventory::Transport;
use crate::vault::VaultBackend;

/// What to do once configuration is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the inventory.
    List,
    Add(DeviceFields),
    Edit {
        fields: DeviceFields,
        rename: Option<String>,
    },
    Remove { id: String },
    /// Move the given devices to the front, in order.
    Reorder { ids: Vec<String> },
    /// Store a credential, prompting for the secret.
    Login { id: String, username: Option<String> },
    Forget { id: String },
    /// Interactive shell.
    Connect { id: String, raw: bool },
    /// Run commands and print their output.
    Exec { id: String, commands: Vec<String> },
    Backup { id: String, dir: Option<PathBuf>, list: bool },
    Restore { id: String, file: PathBuf },
    Search {
        source: SearchSource,
        term: String,
        exclude: bool,
    },
    /// `show ip interface brief` as a table.
    Interfaces { id: String },
    Vlans { id: String },
    /// `default interface` on one interface.
    Reset { id: String, interface: String },
    Template(TemplateCommand),
    /// Push a template, optionally onto a set of interfaces.
    Apply {
        id: String,
        template: String,
        interfaces: Vec<String>,
    },
}

/// Record fields given on the command line. Unset fields keep their
/// current (or default) value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFields {
    pub id: String,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub transport: Option<Transport>,
    pub port: Option<u16>,
}

/// Where `search` reads the running configuration from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchSource {
    Device(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateCommand {
    List,
    Show { path: String },
    /// Save from `file`, or from stdin when absent.
    Save { path: String, file: Option<PathBuf> },
    Delete { path: String },
    Rename { from: String, to: String },
}

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
pub struct Args {
    /// Path to configuration file.
    pub config: Option<PathBuf>,
    /// Inventory file (overrides config file).
    pub inventory: Option<PathBuf>,
    pub vault: Option<VaultBackend>,
    /// Connect timeout in seconds.
    pub timeout: Option<u64>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: Option<String>,
    /// Show version and exit.
    pub version: bool,
    /// Show help and exit.
    pub help: bool,
    pub command: Option<Command>,
}

/// Command-specific options, checked against the command afterwards.
#[derive(Debug, Default)]
struct Flags {
    used: Vec<&'static str>,
    name: Option<String>,
    device_type: Option<String>,
    transport: Option<Transport>,
    port: Option<u16>,
    rename: Option<String>,
    user: Option<String>,
    raw: bool,
    exclude: bool,
    list: bool,
    dir: Option<PathBuf>,
    file: Option<PathBuf>,
    template: Option<String>,
    interfaces: Vec<String>,
}

impl Flags {
    fn mark(&mut self, flag: &'static str) {
        if !self.used.contains(&flag) {
            self.used.push(flag);
        }
    }

    fn allow(&self, command: &'static str, allowed: &[&'static str]) -> Result<(), ArgsError> {
        match self.used.iter().find(|f| !allowed.contains(f)) {
            Some(flag) => Err(ArgsError::UnexpectedOption(command, *flag)),
            None => Ok(()),
        }
    }
}

/// Parse command-line arguments.
pub fn parse_args() -> Result<Args, ArgsError> {
    parse_args_from(std::env::args_os())
}

/// Parse arguments from an iterator (for testing).
pub fn parse_args_from<I>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = OsString>,
{
    use lexopt::prelude::*;

    let mut result = Args::default();
    let mut flags = Flags::default();
    let mut words: Vec<String> = Vec::new();
    let mut parser = lexopt::Parser::from_iter(args);

    while let Some(arg) = parser.next()? {
        match arg {
            Short('h') | Long("help") => result.help = true,
            Short('V') | Long("version") => result.version = true,
            Short('c') | Long("config") => {
                result.config = Some(parser.value()?.parse()?);
            }
            Short('i') | Long("inventory") => {
                result.inventory = Some(parser.value()?.parse()?);
            }
            Long("vault") => {
                let value: String = parser.value()?.parse()?;
                result.vault = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("vault", value))?,
                );
            }
            Short('t') | Long("timeout") => {
                let value: String = parser.value()?.parse()?;
                result.timeout = match value.parse() {
                    Ok(secs) if secs > 0 => Some(secs),
                    _ => return Err(ArgsError::InvalidValue("timeout", value)),
                };
            }
            Short('l') | Long("log-level") => {
                result.log_level = Some(parser.value()?.parse()?);
            }
            Long("name") => {
                flags.mark("name");
                flags.name = Some(parser.value()?.parse()?);
            }
            Long("type") => {
                flags.mark("type");
                flags.device_type = Some(parser.value()?.parse()?);
            }
            Long("transport") => {
                flags.mark("transport");
                let value: String = parser.value()?.parse()?;
                flags.transport = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("transport", value))?,
                );
            }
            Short('p') | Long("port") => {
                flags.mark("port");
                let value: String = parser.value()?.parse()?;
                flags.port = Some(
                    value
                        .parse()
                        .map_err(|_| ArgsError::InvalidValue("port", value))?,
                );
            }
            Long("rename") => {
                flags.mark("rename");
                flags.rename = Some(parser.value()?.parse()?);
            }
            Short('u') | Long("user") => {
                flags.mark("user");
                flags.user = Some(parser.value()?.parse()?);
            }
            Long("raw") => {
                flags.mark("raw");
                flags.raw = true;
            }
            Long("exclude") => {
                flags.mark("exclude");
                flags.exclude = true;
            }
            Long("list") => {
                flags.mark("list");
                flags.list = true;
            }
            Short('d') | Long("dir") => {
                flags.mark("dir");
                flags.dir = Some(parser.value()?.parse()?);
            }
            Short('f') | Long("file") => {
                flags.mark("file");
                flags.file = Some(parser.value()?.parse()?);
            }
            Short('T') | Long("template") => {
                flags.mark("template");
                flags.template = Some(parser.value()?.parse()?);
            }
            Short('I') | Long("interface") => {
                flags.mark("interface");
                let value: String = parser.value()?.parse()?;
                flags.interfaces.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string),
                );
            }
            Value(val) => words.push(val.string()?),
            _ => return Err(arg.unexpected().into()),
        }
    }

    if let Some((name, operands)) = words.split_first() {
        result.command = Some(build_command(name, operands, &flags)?);
    } else if let Some(flag) = flags.used.first() {
        return Err(ArgsError::UnexpectedOption("netdeck", *flag));
    }
    Ok(result)
}

fn operands<const N: usize>(
    command: &'static str,
    operands: &[String],
) -> Result<[String; N], ArgsError> {
    <[String; N]>::try_from(operands.to_vec())
        .map_err(|_| ArgsError::WrongOperands(command, operands.len()))
}

fn build_command(name: &str, words: &[String], flags: &Flags) -> Result<Command, ArgsError> {
    let command = match name {
        "list" | "ls" => {
            flags.allow("list", &[])?;
            let [] = operands("list", words)?;
            Command::List
        }
        "add" | "edit" => {
            let [id] = operands(if name == "add" { "add" } else { "edit" }, words)?;
            let fields = DeviceFields {
                id,
                name: flags.name.clone(),
                device_type: flags.device_type.clone(),
                transport: flags.transport,
                port: flags.port,
            };
            if name == "add" {
                flags.allow("add", &["name", "type", "transport", "port"])?;
                Command::Add(fields)
            } else {
                flags.allow("edit", &["name", "type", "transport", "port", "rename"])?;
                Command::Edit {
                    fields,
                    rename: flags.rename.clone(),
                }
            }
        }
        "remove" | "rm" => {
            flags.allow("remove", &[])?;
            let [id] = operands("remove", words)?;
            Command::Remove { id }
        }
        "reorder" => {
            flags.allow("reorder", &[])?;
            if words.is_empty() {
                return Err(ArgsError::WrongOperands("reorder", 0));
            }
            Command::Reorder { ids: words.to_vec() }
        }
        "login" => {
            flags.allow("login", &["user"])?;
            let [id] = operands("login", words)?;
            Command::Login {
                id,
                username: flags.user.clone(),
            }
        }
        "forget" => {
            flags.allow("forget", &[])?;
            let [id] = operands("forget", words)?;
            Command::Forget { id }
        }
        "connect" => {
            flags.allow("connect", &["raw"])?;
            let [id] = operands("connect", words)?;
            Command::Connect { id, raw: flags.raw }
        }
        "exec" => {
            flags.allow("exec", &[])?;
            match words.split_first() {
                Some((id, commands)) if !commands.is_empty() => Command::Exec {
                    id: id.clone(),
                    commands: commands.to_vec(),
                },
                _ => return Err(ArgsError::WrongOperands("exec", words.len())),
            }
        }
        "backup" => {
            flags.allow("backup", &["dir", "list"])?;
            let [id] = operands("backup", words)?;
            Command::Backup {
                id,
                dir: flags.dir.clone(),
                list: flags.list,
            }
        }
        "restore" => {
            flags.allow("restore", &[])?;
            let [id, file] = operands("restore", words)?;
            Command::Restore {
                id,
                file: PathBuf::from(file),
            }
        }
        "search" => {
            flags.allow("search", &["exclude", "file"])?;
            let (source, term) = match &flags.file {
                Some(file) => {
                    let [term] = operands("search", words)?;
                    (SearchSource::File(file.clone()), term)
                }
                None => {
                    let [id, term] = operands("search", words)?;
                    (SearchSource::Device(id), term)
                }
            };
            Command::Search {
                source,
                term,
                exclude: flags.exclude,
            }
        }
        "interfaces" => {
            flags.allow("interfaces", &[])?;
            let [id] = operands("interfaces", words)?;
            Command::Interfaces { id }
        }
        "vlans" => {
            flags.allow("vlans", &[])?;
            let [id] = operands("vlans", words)?;
            Command::Vlans { id }
        }
        "reset" => {
            flags.allow("reset", &[])?;
            let [id, interface] = operands("reset", words)?;
            Command::Reset { id, interface }
        }
        "template" => build_template_command(words, flags)?,
        "apply" => {
            flags.allow("apply", &["template", "interface"])?;
            let [id] = operands("apply", words)?;
            let template = flags
                .template
                .clone()
                .ok_or(ArgsError::MissingOption("apply", "template"))?;
            Command::Apply {
                id,
                template,
                interfaces: flags.interfaces.clone(),
            }
        }
        other => return Err(ArgsError::UnknownCommand(other.to_string())),
    };
    Ok(command)
}

fn build_template_command(words: &[String], flags: &Flags) -> Result<Command, ArgsError> {
    let Some((action, rest)) = words.split_first() else {
        return Err(ArgsError::WrongOperands("template", 0));
    };
    let command = match action.as_str() {
        "list" => {
            flags.allow("template list", &[])?;
            let [] = operands("template list", rest)?;
            TemplateCommand::List
        }
        "show" => {
            flags.allow("template show", &[])?;
            let [path] = operands("template show", rest)?;
            TemplateCommand::Show { path }
        }
        "save" => {
            flags.allow("template save", &["file"])?;
            let [path] = operands("template save", rest)?;
            TemplateCommand::Save {
                path,
                file: flags.file.clone(),
            }
        }
        "delete" => {
            flags.allow("template delete", &[])?;
            let [path] = operands("template delete", rest)?;
            TemplateCommand::Delete { path }
        }
        "rename" => {
            flags.allow("template rename", &[])?;
            let [from, to] = operands("template rename", rest)?;
            TemplateCommand::Rename { from, to }
        }
        other => return Err(ArgsError::UnknownCommand(format!("template {other}"))),
    };
    Ok(Command::Template(command))
}

/// Print help message.
pub fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        r#"netdeck {version}
Device inventory, keyring-backed credentials and SSH/Telnet sessions

USAGE:
    netdeck [OPTIONS] <COMMAND>

COMMANDS:
    list                          List devices
    add <ID> [DEVICE OPTIONS]     Add a device
    edit <ID> [DEVICE OPTIONS] [--rename NEW_ID]
    remove <ID>                   Remove a device and its credential
    reorder <ID>...               Move devices to the front, in order
    login <ID> [-u USER]          Store a credential (prompts for the secret)
    forget <ID>                   Delete the stored credential
    connect <ID> [--raw]          Interactive shell (type ~. to leave)
    exec <ID> <COMMAND>...        Run commands and print their output
    backup <ID> [-d DIR] [--list] Save the running configuration
    restore <ID> <FILE>           Replay a saved configuration
    search <ID> <TERM> [--exclude] [-f FILE]
                                  Interfaces whose config contains TERM
    interfaces <ID>               Interface status table
    vlans <ID>                    VLAN table
    reset <ID> <INTERFACE>        Return an interface to defaults
    template list | show <PATH> | save <PATH> [-f FILE] | delete <PATH>
           | rename <FROM> <TO>
    apply <ID> -T <TEMPLATE> [-I IFACE[,IFACE]...]
                                  Push a template, optionally per interface

DEVICE OPTIONS:
        --name <NAME>             Display name
        --type <TYPE>             Dialect tag [default: cisco_ios]
        --transport <ssh|telnet>  [default: ssh]
    -p, --port <PORT>             Port override

OPTIONS:
    -c, --config <FILE>     Path to configuration file (JSON)
    -i, --inventory <FILE>  Inventory file [default: config/switches.json]
        --vault <BACKEND>   Credential store: keyring or memory
    -t, --timeout <SECS>    Connect timeout [default: 10]
    -l, --log-level <LVL>   Log level (error, warn, info, debug, trace)
    -h, --help              Print help
    -V, --version           Print version

ENVIRONMENT VARIABLES:
    NETDECK_INVENTORY         Inventory file (overrides config)
    NETDECK_VAULT             Credential store backend (overrides config)
    NETDECK_CONNECT_TIMEOUT   Connect timeout in seconds (overrides config)
    NETDECK_LOG_LEVEL         Log level (overrides config)
    RUST_LOG                  Alternative log level setting

EXAMPLES:
    netdeck add 10.0.0.1 --name core-sw
    netdeck login 10.0.0.1 -u admin
    netdeck exec 10.0.0.1 "show version"
    netdeck search 10.0.0.1 "vlan 20" --exclude
    netdeck apply 10.0.0.1 -T access/printer.txt -I Gi1/0/1,Gi1/0/2
"#
    );
}

/// Print version.
pub fn print_version() {
    println!("netdeck {}", env!("CARGO_PKG_VERSION"));
}

/// Argument parsing errors.
#[derive(Debug)]
pub enum ArgsError {
    /// Lexopt parsing error.
    Lexopt(lexopt::Error),
    /// Invalid argument value.
    InvalidValue(&'static str, String),
    UnknownCommand(String),
    /// Option not accepted by the command.
    UnexpectedOption(&'static str, &'static str),
    MissingOption(&'static str, &'static str),
    /// Wrong number of operands for the command.
    WrongOperands(&'static str, usize),
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexopt(e) => write!(f, "{}", e),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for --{}: '{}'", name, value)
            }
            Self::UnknownCommand(name) => write!(f, "unknown command: '{}'", name),
            Self::UnexpectedOption(command, flag) => {
                write!(f, "option --{} is not accepted by '{}'", flag, command)
            }
            Self::MissingOption(command, flag) => {
                write!(f, "'{}' requires --{}", command, flag)
            }
            Self::WrongOperands(command, count) => {
                write!(f, "wrong number of arguments for '{}' ({} given)", command, count)
            }
        }
    }
}

impl std::error::Error for ArgsError {}

impl From<lexopt::Error> for ArgsError {
    fn from(e: lexopt::Error) -> Self {
        Self::Lexopt(e)
    }
}
