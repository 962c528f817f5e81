//! netdeck binary entry point.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::time::Duration;

use tokio::io::BufReader;
use tracing::{error, info};

use netdeck::cli::{self, Command, DeviceFields, SearchSource, TemplateCommand};
use netdeck::config::Config;
use netdeck::{
    backup, ios, logging, open_vault, CloseReason, CredentialEntry, DeviceController,
    DeviceRecord, InventoryStore, NetdeckError, Session, SessionDispatcher, ShellView,
    TemplateEntry, TemplateStore,
};

fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("Try 'netdeck --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }
    let Some(command) = args.command.clone() else {
        cli::print_help();
        return ExitCode::from(2);
    };

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    logging::init(Some(config.log_filter()));

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: cannot start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(&config, command));
    // A pending stdin read never finishes on its own.
    runtime.shutdown_timeout(Duration::from_millis(500));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, command: Command) -> netdeck::Result<()> {
    let templates = TemplateStore::new(&config.templates.dir);
    let command = match command {
        Command::Template(action) => return template_command(&templates, action),
        Command::Search {
            source: SearchSource::File(path),
            term,
            exclude,
        } => {
            let text = std::fs::read_to_string(&path)?;
            print_names(&ios::search_interfaces(&text, &term, search_mode(exclude)));
            return Ok(());
        }
        other => other,
    };

    let backend = config
        .vault_backend()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let vault = open_vault(backend, &config.vault.service);
    let mut controller = DeviceController::new(
        InventoryStore::new(&config.inventory.path),
        vault,
        SessionDispatcher::new(config.session_settings()),
    )
    .with_connect_timeout(config.connect_timeout());
    controller.load()?;
    info!(
        inventory = %config.inventory.path.display(),
        devices = controller.devices().len(),
        "inventory ready"
    );
    let timeout = controller.dispatcher().settings().command_timeout;

    match command {
        Command::List => print_devices(controller.devices()),
        Command::Add(fields) => {
            let record = apply_fields(DeviceRecord::new(fields.id.trim()), &fields);
            let label = record.display_label();
            controller.add(record)?;
            println!("added {label}");
        }
        Command::Edit { fields, rename } => {
            let current = controller
                .device(&fields.id)
                .cloned()
                .ok_or_else(|| NetdeckError::DeviceNotFound(fields.id.clone()))?;
            let mut record = apply_fields(current, &fields);
            if let Some(new_id) = rename {
                record.id = new_id;
            }
            let label = record.display_label();
            controller.edit(&fields.id, record)?;
            println!("updated {label}");
        }
        Command::Remove { id } => {
            let removed = controller.remove(&id)?;
            println!("removed {}", removed.display_label());
        }
        Command::Reorder { ids } => {
            controller.reorder(ids)?;
            print_devices(controller.devices());
        }
        Command::Login { id, username } => {
            let record = controller
                .device(&id)
                .cloned()
                .ok_or_else(|| NetdeckError::DeviceNotFound(id.clone()))?;
            let credential = read_credential(&record, username)?
                .ok_or_else(|| NetdeckError::CredentialMissing(id.clone()))?;
            controller.store_credential(&id, &credential)?;
            println!("credential stored for {id}");
        }
        Command::Forget { id } => {
            controller.forget_credential(&id)?;
            println!("credential removed for {id}");
        }
        Command::Connect { id, raw } => {
            let session = connect(&mut controller, &id).await?;
            eprintln!("connected to {} (type ~. to leave)", session.device().display_label());
            let view = ShellView::new(session.clone(), tokio::io::stdout()).strip_ansi(!raw);
            let reason = tokio::select! {
                reason = view.run(BufReader::new(tokio::io::stdin())) => reason?,
                _ = tokio::signal::ctrl_c() => {
                    session.close();
                    CloseReason::Local
                }
            };
            eprintln!("\nconnection closed: {reason}");
        }
        Command::Exec { id, commands } => {
            let session = connect(&mut controller, &id).await?;
            for command in &commands {
                let output = session.send_command(command, timeout).await?;
                if commands.len() > 1 {
                    println!("### {command}");
                }
                println!("{output}");
            }
        }
        Command::Backup { id, dir, list } => {
            let dir = dir.unwrap_or_else(|| config.backups.dir.clone());
            if list {
                for path in backup::list_backups(&dir, &id)? {
                    println!("{}", path.display());
                }
            } else {
                let session = connect(&mut controller, &id).await?;
                let path = backup::backup_running_config(&session, &dir, &id, timeout).await?;
                println!("{}", path.display());
            }
        }
        Command::Restore { id, file } => {
            let session = connect(&mut controller, &id).await?;
            print_output(&backup::restore_config(&session, &file, timeout).await?);
        }
        Command::Search {
            source: SearchSource::Device(id),
            term,
            exclude,
        } => {
            let session = connect(&mut controller, &id).await?;
            let config = ios::running_config(&session, timeout).await?;
            print_names(&ios::search_interfaces(&config, &term, search_mode(exclude)));
        }
        Command::Interfaces { id } => {
            let session = connect(&mut controller, &id).await?;
            println!(
                "{:<24} {:<16} {:<22} {}",
                "INTERFACE", "IP-ADDRESS", "STATUS", "PROTOCOL"
            );
            for row in ios::interface_status(&session, timeout).await? {
                println!(
                    "{:<24} {:<16} {:<22} {}",
                    row.name,
                    row.ip_address,
                    row.status.to_string(),
                    row.protocol
                );
            }
        }
        Command::Vlans { id } => {
            let session = connect(&mut controller, &id).await?;
            println!("{:<6} {:<32} {:<10} PORTS", "VLAN", "NAME", "STATUS");
            for vlan in ios::vlans(&session, timeout).await? {
                println!(
                    "{:<6} {:<32} {:<10} {}",
                    vlan.id,
                    vlan.name,
                    vlan.status,
                    vlan.ports.join(", ")
                );
            }
        }
        Command::Reset { id, interface } => {
            let session = connect(&mut controller, &id).await?;
            print_output(&ios::default_interface(&session, &interface, timeout).await?);
        }
        Command::Apply {
            id,
            template,
            interfaces,
        } => {
            let text = templates.load(&template)?;
            let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
            let session = connect(&mut controller, &id).await?;
            let output = if interfaces.is_empty() {
                session.send_config_set(&lines, timeout).await?
            } else {
                ios::configure_interfaces(&session, &interfaces, &lines, timeout).await?
            };
            print_output(&output);
        }
        // Handled before the inventory is opened.
        Command::Template(_)
        | Command::Search {
            source: SearchSource::File(_),
            ..
        } => {}
    }

    controller.disconnect();
    Ok(())
}

async fn connect(controller: &mut DeviceController, id: &str) -> netdeck::Result<Session> {
    controller
        .connect(id, |record| read_credential(record, None).ok().flatten())
        .await
}

fn template_command(store: &TemplateStore, action: TemplateCommand) -> netdeck::Result<()> {
    match action {
        TemplateCommand::List => print_tree(&store.list()?, 0),
        TemplateCommand::Show { path } => print!("{}", store.load(&path)?),
        TemplateCommand::Save { path, file } => {
            let content = match file {
                Some(file) => std::fs::read_to_string(file)?,
                None => io::read_to_string(io::stdin())?,
            };
            store.save(&path, &content)?;
            println!("saved {path}");
        }
        TemplateCommand::Delete { path } => {
            store.delete(&path)?;
            println!("deleted {path}");
        }
        TemplateCommand::Rename { from, to } => {
            store.rename(&from, &to)?;
            println!("renamed {from} -> {to}");
        }
    }
    Ok(())
}

fn apply_fields(mut record: DeviceRecord, fields: &DeviceFields) -> DeviceRecord {
    if let Some(name) = &fields.name {
        record.name = name.clone();
    }
    if let Some(device_type) = &fields.device_type {
        record.device_type = device_type.clone();
    }
    if let Some(transport) = fields.transport {
        record.transport = transport;
    }
    if fields.port.is_some() {
        record.port = fields.port;
    }
    record
}

fn search_mode(exclude: bool) -> ios::SearchMode {
    if exclude {
        ios::SearchMode::Exclude
    } else {
        ios::SearchMode::Include
    }
}

/// Ask on the terminal for a credential. An empty username declines.
fn read_credential(
    record: &DeviceRecord,
    username: Option<String>,
) -> io::Result<Option<CredentialEntry>> {
    let stdin = io::stdin();
    let mut stdin = stdin.lock();
    let mut stderr = io::stderr();

    let username = match username {
        Some(username) => username,
        None => {
            write!(stderr, "username for {}: ", record.display_label())?;
            stderr.flush()?;
            read_trimmed(&mut stdin)?
        }
    };
    if username.is_empty() {
        return Ok(None);
    }
    write!(stderr, "password for {username}@{}: ", record.id)?;
    stderr.flush()?;
    let secret = read_trimmed(&mut stdin)?;
    Ok(Some(CredentialEntry::new(username, secret)))
}

fn read_trimmed(input: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_devices(devices: &[DeviceRecord]) {
    if devices.is_empty() {
        println!("no devices");
        return;
    }
    println!(
        "{:>3}  {:<24} {:<20} {:<12} {:<9} PORT",
        "#", "ID", "NAME", "TYPE", "TRANSPORT"
    );
    for (index, device) in devices.iter().enumerate() {
        println!(
            "{:>3}  {:<24} {:<20} {:<12} {:<9} {}",
            index + 1,
            device.id,
            device.name,
            device.device_type,
            device.transport.as_str(),
            device.effective_port()
        );
    }
}

fn print_tree(entries: &[TemplateEntry], depth: usize) {
    for entry in entries {
        let indent = "  ".repeat(depth);
        match entry {
            TemplateEntry::Directory { name, children, .. } => {
                println!("{indent}{name}/");
                print_tree(children, depth + 1);
            }
            TemplateEntry::File { name, .. } => println!("{indent}{name}"),
        }
    }
}

fn print_names(names: &[String]) {
    if names.is_empty() {
        eprintln!("no matching interfaces");
    }
    for name in names {
        println!("{name}");
    }
}

fn print_output(output: &str) {
    let output = output.trim_end();
    if !output.is_empty() {
        println!("{output}");
    }
}
