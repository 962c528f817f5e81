//! Cisco IOS helpers.
//!
//! Pure parsers over running configurations and `show` output, plus a few
//! operations that drive an open [`Session`].

mod interfaces;
mod show;

use std::time::Duration;

use tracing::info;

pub use interfaces::{
    interface_range_command, parse_interface_blocks, parse_interface_name, search_interfaces,
    InterfaceBlock, InterfaceName, SearchMode,
};
pub use show::{
    parse_hostname, parse_ip_interface_brief, parse_vlan_brief, InterfaceStatus, LinkStatus, Vlan,
};

use crate::error::SessionError;
use crate::session::Session;

/// Fetch the running configuration.
pub async fn running_config(session: &Session, timeout: Duration) -> Result<String, SessionError> {
    session.send_command("show running-config", timeout).await
}

/// Fetch and parse `show ip interface brief`.
pub async fn interface_status(
    session: &Session,
    timeout: Duration,
) -> Result<Vec<InterfaceStatus>, SessionError> {
    let output = session.send_command("show ip interface brief", timeout).await?;
    Ok(parse_ip_interface_brief(&output))
}

/// Fetch and parse `show vlan brief`.
pub async fn vlans(session: &Session, timeout: Duration) -> Result<Vec<Vlan>, SessionError> {
    let output = session.send_command("show vlan brief", timeout).await?;
    Ok(parse_vlan_brief(&output))
}

/// The configured hostname, if any.
pub async fn hostname(
    session: &Session,
    timeout: Duration,
) -> Result<Option<String>, SessionError> {
    let output = session
        .send_command("show running-config | include hostname", timeout)
        .await?;
    Ok(parse_hostname(&output))
}

/// Apply `lines` to every interface in `names` at once.
///
/// Enters the interfaces with [`interface_range_command`] inside config
/// mode. No names is a no-op.
pub async fn configure_interfaces<N, L>(
    session: &Session,
    names: &[N],
    lines: &[L],
    timeout: Duration,
) -> Result<String, SessionError>
where
    N: AsRef<str>,
    L: AsRef<str>,
{
    let Some(enter) = interface_range_command(names) else {
        return Ok(String::new());
    };
    info!(session = %session.id(), interfaces = names.len(), "configuring interfaces");
    let commands = std::iter::once(enter)
        .chain(lines.iter().map(|l| l.as_ref().to_string()))
        .chain(std::iter::once("exit".to_string()));
    session.send_config_set(commands, timeout).await
}

/// Reset one interface to its default configuration.
pub async fn default_interface(
    session: &Session,
    name: &str,
    timeout: Duration,
) -> Result<String, SessionError> {
    info!(session = %session.id(), interface = name, "defaulting interface");
    session
        .send_config_set([format!("default interface {}", name.trim())], timeout)
        .await
}
