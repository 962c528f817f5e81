//! CLI integration tests.
//!
//! These tests verify the CLI argument parsing and configuration loading.

use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

use netdeck::cli::{parse_args_from, Args, Command, DeviceFields, TemplateCommand};
use netdeck::config::Config;
use netdeck::{Transport, VaultBackend};

fn args(args: &[&str]) -> Vec<OsString> {
    std::iter::once("netdeck")
        .chain(args.iter().copied())
        .map(OsString::from)
        .collect()
}

// ============================================================================
// CLI Argument Tests
// ============================================================================

#[test]
fn test_cli_defaults() {
    let result = parse_args_from(args(&[])).unwrap();

    assert!(result.config.is_none());
    assert!(result.inventory.is_none());
    assert!(result.vault.is_none());
    assert!(result.log_level.is_none());
    assert!(result.command.is_none());
    assert!(!result.help);
}

#[test]
fn test_cli_full_options() {
    let result = parse_args_from(args(&[
        "-c",
        "/etc/netdeck.json",
        "-i",
        "lab.json",
        "--vault",
        "memory",
        "-t",
        "3",
        "-l",
        "debug",
        "add",
        "sw-lab-1",
        "--type",
        "cisco_nxos",
        "--transport",
        "telnet",
    ]))
    .unwrap();

    assert_eq!(result.config, Some(PathBuf::from("/etc/netdeck.json")));
    assert_eq!(result.inventory, Some(PathBuf::from("lab.json")));
    assert_eq!(result.vault, Some(VaultBackend::Memory));
    assert_eq!(result.timeout, Some(3));
    assert_eq!(result.log_level, Some("debug".to_string()));
    assert_eq!(
        result.command,
        Some(Command::Add(DeviceFields {
            id: "sw-lab-1".into(),
            name: None,
            device_type: Some("cisco_nxos".into()),
            transport: Some(Transport::Telnet),
            port: None,
        }))
    );
}

#[test]
fn test_cli_template_save_from_file() {
    let result = parse_args_from(args(&["template", "save", "access/voice.txt", "-f", "v.txt"]))
        .unwrap();
    assert_eq!(
        result.command,
        Some(Command::Template(TemplateCommand::Save {
            path: "access/voice.txt".into(),
            file: Some(PathBuf::from("v.txt")),
        }))
    );
}

#[test]
fn test_cli_wrong_operand_count() {
    assert!(parse_args_from(args(&["remove"])).is_err());
    assert!(parse_args_from(args(&["restore", "sw1"])).is_err());
    assert!(parse_args_from(args(&["list", "extra"])).is_err());
}

#[test]
fn test_cli_option_not_for_command() {
    let err = parse_args_from(args(&["list", "--raw"])).unwrap_err();
    assert!(err.to_string().contains("--raw"));
    assert!(err.to_string().contains("list"));
}

// ============================================================================
// Configuration Loading Tests
// ============================================================================

#[test]
fn test_config_from_json_file() {
    let json = r#"{
        "inventory": { "path": "/srv/netdeck/switches.json" },
        "vault": { "backend": "memory", "service": "netdeck-lab" },
        "session": {
            "connect_timeout_secs": 5,
            "command_timeout_secs": 60,
            "poll_interval_ms": 25,
            "transcript_limit": 4096
        },
        "backups": { "dir": "/srv/netdeck/backups" },
        "templates": { "dir": "/srv/netdeck/templates" },
        "logging": { "level": "debug" }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let config = Config::from_file(file.path()).unwrap();

    assert_eq!(config.inventory.path, PathBuf::from("/srv/netdeck/switches.json"));
    assert_eq!(config.vault_backend().unwrap(), VaultBackend::Memory);
    assert_eq!(config.vault.service, "netdeck-lab");
    assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    assert_eq!(config.backups.dir, PathBuf::from("/srv/netdeck/backups"));
    assert_eq!(config.templates.dir, PathBuf::from("/srv/netdeck/templates"));
    assert_eq!(config.logging.level, "debug");

    let settings = config.session_settings();
    assert_eq!(settings.command_timeout, Duration::from_secs(60));
    assert_eq!(settings.poll_interval, Duration::from_millis(25));
    assert_eq!(settings.transcript_limit, 4096);
    assert_eq!(settings.term_cols, 120); // Default
}

#[test]
fn test_config_priority_cli_over_file() {
    let json = r#"{
        "inventory": { "path": "from-file.json" },
        "session": { "connect_timeout_secs": 30 }
    }"#;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        inventory: Some(PathBuf::from("from-cli.json")),
        timeout: Some(2),
        ..Args::default()
    };

    let config = Config::load(&args).unwrap();

    assert_eq!(config.inventory.path, PathBuf::from("from-cli.json"));
    assert_eq!(config.connect_timeout(), Duration::from_secs(2));
}

#[test]
fn test_config_rejects_unknown_backend() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(br#"{ "vault": { "backend": "plaintext" } }"#)
        .unwrap();

    let args = Args {
        config: Some(file.path().to_path_buf()),
        ..Args::default()
    };
    let err = Config::load(&args).unwrap_err();
    assert!(err.to_string().contains("vault.backend"));
}

#[test]
fn test_config_missing_file() {
    let args = Args {
        config: Some(PathBuf::from("/nonexistent/netdeck.json")),
        ..Args::default()
    };
    assert!(Config::load(&args).is_err());
}

// ============================================================================
// Configuration Serialization Tests
// ============================================================================

#[test]
fn test_config_roundtrip() {
    let original = Config::default();
    let json = serde_json::to_string(&original).unwrap();
    let loaded: Config = serde_json::from_str(&json).unwrap();

    assert_eq!(original.inventory.path, loaded.inventory.path);
    assert_eq!(
        original.session.connect_timeout_secs,
        loaded.session.connect_timeout_secs
    );
}

#[test]
fn test_config_partial_deserialization() {
    let json = r#"{"vault": {"service": "lab"}}"#;
    let config: Config = serde_json::from_str(json).unwrap();

    assert_eq!(config.vault.service, "lab");
    assert_eq!(config.vault.backend, "keyring"); // Default
    assert_eq!(config.session.poll_interval_ms, 50); // Default
}
