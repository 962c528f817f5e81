//! Running-configuration backup and restore.
//!
//! Backups are plain text files named `backup_<device>_<YYYYmmdd_HHMMSS>.txt`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info};

use crate::error::Result;
use crate::session::Session;

const PREFIX: &str = "backup_";
const EXTENSION: &str = ".txt";

/// File-name-safe form of a device id.
fn file_stem(device_id: &str) -> String {
    device_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Save the device's running configuration under `dir`.
///
/// Returns the path written.
pub async fn backup_running_config(
    session: &Session,
    dir: &Path,
    device_id: &str,
    timeout: Duration,
) -> Result<PathBuf> {
    let config = session.send_command("show running-config", timeout).await?;
    fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("{PREFIX}{}_{stamp}{EXTENSION}", file_stem(device_id)));
    fs::write(&path, format!("{}\n", config.trim_end()))?;
    info!(device = device_id, path = %path.display(), bytes = config.len(), "backup written");
    Ok(path)
}

/// Backups of `device_id` in `dir`, newest first. A missing directory
/// has no backups.
pub fn list_backups(dir: &Path, device_id: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{PREFIX}{}_", file_stem(device_id));
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(stamp) = name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(EXTENSION))
        else {
            continue;
        };
        // Reject ids that merely share a prefix, e.g. `sw1` vs `sw1_b`.
        if stamp.len() == 15 && stamp.chars().all(|c| c.is_ascii_digit() || c == '_') {
            found.push((stamp.to_string(), entry.path()));
        }
    }
    found.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Whether a backup line should be replayed.
fn is_config_line(line: &str) -> bool {
    let trimmed = line.trim();
    !(trimmed.is_empty()
        || trimmed.starts_with('!')
        || trimmed.starts_with("Building configuration")
        || trimmed.starts_with("Current configuration")
        || trimmed == "end")
}

/// Replay a saved configuration file as one config set.
pub async fn restore_config(session: &Session, file: &Path, timeout: Duration) -> Result<String> {
    let text = fs::read_to_string(file)?;
    let lines: Vec<&str> = text.lines().filter(|l| is_config_line(l)).collect();
    debug!(
        session = %session.id(),
        path = %file.display(),
        lines = lines.len(),
        "restoring configuration"
    );
    let output = session.send_config_set(lines, timeout).await?;
    info!(session = %session.id(), path = %file.display(), "configuration restored");
    Ok(output)
}
