//! # Command Line Interface
//!
//! This module provides the command-line interface for clonr's standalone
//! mode, including argument parsing, command definitions, and command
//! implementations.
//!
//! ## Commands
//!
//! - `standalone init` - Initialize pairing and print the shareable key
//! - `standalone rotate` - Invalidate the current key and issue a new one
//! - `standalone status` - Show pairing state and expiry countdown
//! - `standalone clients` - List registered and pending clients
//! - `standalone accept` - Accept a pending client with its secret
//! - `standalone connect` - Pair this instance with a remote source
//! - `standalone disconnect` - Remove a connection
//! - `standalone archive` / `extract` - Encrypted repository archives
//! - `standalone decrypt` - Decrypt stored synced items
//! - `standalone encrypt` - Manage the at-rest encryption key

use crate::archive::{self, ArchiveOptions};
use crate::config::{self, Config};
use crate::handshake::{self, ClientHandshake, StandaloneConnection};
use crate::lifecycle::{self, ServerEncryptionConfig};
use crate::pairing::{PairingKey, ServerPairingConfig};
use crate::payload::{SyncItemStore, SyncState};
use crate::registry::ClientRegistry;
use crate::terminal::{read_new_password, Terminal};
use anyhow::Result;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

/// Command-line interface structure for clonr.
#[derive(Parser)]
#[command(name = "clonr")]
#[command(about = "Repository management CLI with secure instance pairing and encrypted sync")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Secure pairing, encrypted sync, and archives between clonr instances
    Standalone {
        #[command(subcommand)]
        command: StandaloneCommands,
    },
}

/// Standalone-mode subcommands.
#[derive(Subcommand)]
pub enum StandaloneCommands {
    /// Initialize pairing and print the shareable pairing key
    Init {
        /// Host other instances should connect to
        #[arg(long)]
        host: Option<String>,
        /// Port other instances should connect to
        #[arg(long)]
        port: Option<u16>,
        /// Write the key to a file (structured form) instead of printing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Invalidate the current pairing key and issue a new one
    Rotate,

    /// Show pairing configuration and expiry countdown
    Status,

    /// Disable pairing entirely
    Disable {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// List registered clients and pending registrations
    Clients {
        /// Include suspended and revoked clients
        #[arg(long)]
        all: bool,
    },

    /// Accept a pending client using the secret shown on its screen
    Accept {
        /// The pairing secret displayed by the client
        display_key: Option<String>,
        /// Pending client ID prefix, required when several are pending
        #[arg(long)]
        client: Option<String>,
        /// Only list pending registrations
        #[arg(long)]
        list: bool,
    },

    /// Pair this instance with a remote source using its pairing key
    Connect {
        /// The encoded pairing key
        key: Option<String>,
        /// Local name for the connection
        #[arg(short, long)]
        name: Option<String>,
        /// Read the pairing key from an exported file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Remove a connection to a remote source
    Disconnect {
        /// Connection name
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Suspend a registered client
    Suspend {
        /// Client ID prefix
        client: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Reactivate a suspended client
    Reactivate {
        /// Client ID prefix
        client: String,
    },

    /// Revoke a registered client's access permanently
    Revoke {
        /// Client ID prefix
        client: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Create an encrypted archive of one or more repositories
    Archive {
        /// Repository paths to archive
        paths: Vec<PathBuf>,
        /// Output archive file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Exclude version-control metadata (.git directories)
        #[arg(long)]
        no_git: bool,
        /// Compression level, 0-9
        #[arg(long)]
        compression: Option<u32>,
        /// File name patterns to exclude (repeatable)
        #[arg(long)]
        exclude: Vec<String>,
        /// Archive every known repository
        #[arg(long)]
        all: bool,
        /// Archive favorite repositories
        #[arg(long)]
        favorites: bool,
        /// Archive repositories in a workspace
        #[arg(long)]
        workspace: Option<String>,
    },

    /// List or extract an encrypted archive
    Extract {
        /// Archive file
        archive: PathBuf,
        /// Destination directory
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show the manifest without extracting
        #[arg(long)]
        list: bool,
    },

    /// Decrypt stored synced items
    Decrypt {
        /// Limit to one connection
        #[arg(long)]
        connection: Option<String>,
        /// Decrypt items for every connection
        #[arg(long)]
        all: bool,
        /// Show stored items and their states without decrypting
        #[arg(long)]
        list: bool,
    },

    /// Manage the at-rest encryption key
    Encrypt {
        #[command(subcommand)]
        command: EncryptCommands,
    },
}

#[derive(Subcommand)]
pub enum EncryptCommands {
    /// Configure at-rest encryption with a new password
    Setup,
    /// Show encryption key status
    Status,
    /// Rotate the at-rest key to a new password
    Rotate,
}

/// Initialize pairing for this instance and print the shareable key.
///
/// # Errors
///
/// Fails if pairing is already initialized; `rotate` is the explicit way
/// to replace an issued key.
pub async fn init(host: Option<String>, port: Option<u16>, output: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;

    let host = host.unwrap_or_else(|| config.default_host.clone());
    let port = port.unwrap_or(config.default_port);
    let lifetime = Duration::hours(config.pairing_key_lifetime_hours);

    let (key, server_config) = lifecycle::init_pairing(&store, &host, port, lifetime)?;
    info!(instance_id = %server_config.instance_id, "standalone pairing initialized");

    println!("✅ Standalone pairing initialized");
    println!("   Instance ID: {}", server_config.instance_id);
    println!("   Listening:   {}:{}", host, port);
    println!("   Key expires: {}", format_expiry(&server_config, Utc::now()));

    match output {
        Some(path) => {
            tokio::fs::write(&path, key.to_json()).await?;
            println!("   Pairing key written to: {}", path.display());
        }
        None => {
            println!("\n📨 Pairing key (share with the instance that should connect):");
            println!("{}", key.encode());
        }
    }
    println!("\n💡 On the other instance, run: clonr standalone connect <key>");

    Ok(())
}

/// Invalidate the current pairing key and issue a new one.
pub async fn rotate() -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;
    let registry = ClientRegistry::new(store.clone());

    let (key, server_config) = lifecycle::rotate_pairing(
        &store,
        &registry,
        &config.default_host,
        config.default_port,
        Duration::hours(config.pairing_key_lifetime_hours),
    )?;

    println!("🔄 Pairing key rotated");
    println!("   New instance ID: {}", server_config.instance_id);
    println!("   Key expires:     {}", format_expiry(&server_config, Utc::now()));
    println!("   Registered clients keep working; pending handshakes were dropped.");
    println!("\n📨 New pairing key:");
    println!("{}", key.encode());

    Ok(())
}

/// Show pairing configuration and expiry countdown.
pub async fn status() -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;

    match ServerPairingConfig::load(&store)? {
        Some(server_config) => {
            let now = Utc::now();
            println!("🔑 Standalone pairing status\n");
            println!("   Enabled:     {}", server_config.enabled);
            println!("   Instance ID: {}", server_config.instance_id);
            println!("   Port:        {}", server_config.port);
            println!("   Created:     {}", server_config.created_at.to_rfc3339());
            println!("   Key expires: {}", format_expiry(&server_config, now));
            println!(
                "   Capabilities: {}",
                server_config
                    .capabilities
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        None => {
            println!("Standalone pairing is not initialized.");
            println!("Run: clonr standalone init");
        }
    }

    Ok(())
}

/// Disable pairing entirely, deleting the server configuration.
pub async fn disable(force: bool, terminal: &mut dyn Terminal) -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;

    if ServerPairingConfig::load(&store)?.is_none() {
        anyhow::bail!("Standalone pairing is not initialized");
    }

    if !force
        && !terminal.confirm("Disable pairing? New clients will be unable to connect.")?
    {
        println!("Aborted.");
        return Ok(());
    }

    lifecycle::disable_pairing(&store)?;
    println!("✅ Standalone pairing disabled");
    Ok(())
}

/// List registered clients and pending registrations.
pub async fn clients(all: bool) -> Result<()> {
    let config = Config::load_or_init().await?;
    let registry = ClientRegistry::new(config.store()?);

    let registered = registry.list(all)?;
    let pending = registry.pending()?;

    if registered.is_empty() && pending.is_empty() {
        println!("No clients.");
        println!("💡 Hand out a pairing key with 'clonr standalone init' to pair one.");
        return Ok(());
    }

    if !registered.is_empty() {
        println!("👥 Registered clients\n");
        for client in &registered {
            let seen = client
                .last_seen_at
                .map(format_time_ago)
                .unwrap_or_else(|| "never".to_string());
            println!("  {} ({})", client.client_name, client.client_id);
            println!(
                "    Status: {} | Key hint: {} | Syncs: {} | Last seen: {}",
                client.status, client.key_hint, client.sync_count, seen
            );
            println!(
                "    Machine: {} ({} {}, clonr {})",
                client.machine_info.hostname,
                client.machine_info.os,
                client.machine_info.arch,
                client.machine_info.tool_version
            );
            println!();
        }
    }

    if !pending.is_empty() {
        println!("⏳ Pending registrations\n");
        for reg in &pending {
            println!("  {} ({})", reg.client_name, reg.client_id);
            println!(
                "    Initiated: {} | Machine: {}",
                format_time_ago(reg.initiated_at),
                reg.machine_info.hostname
            );
            println!();
        }
        println!("💡 Accept one with: clonr standalone accept [secret] --client <id-prefix>");
    }

    Ok(())
}

/// Accept a pending client, completing the server side of the handshake.
pub async fn accept(
    display_key: Option<String>,
    client: Option<String>,
    list: bool,
    terminal: &mut dyn Terminal,
) -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;
    let registry = ClientRegistry::new(store.clone());

    if list {
        let pending = registry.pending()?;
        if pending.is_empty() {
            println!("No pending client registrations.");
        } else {
            for reg in pending {
                println!("{}  {}  {}", reg.client_id, reg.client_name, reg.initiated_at);
            }
        }
        return Ok(());
    }

    let server_key = lifecycle::load_encryption_key(&store)?;
    let secret = match display_key {
        Some(secret) => secret,
        None => terminal.read_line("Enter the pairing secret shown on the client: ")?,
    };

    let registered = handshake::accept(
        &registry,
        &server_key,
        client.as_deref(),
        &secret,
        Utc::now(),
    )?;

    println!("✅ Client registered: {}", registered.client_name);
    println!("   Client ID: {}", registered.client_id);
    println!("   Key hint:  {}", registered.key_hint);
    Ok(())
}

/// Pair this instance with a remote source, performing the client side of
/// the handshake.
pub async fn connect(
    key: Option<String>,
    name: Option<String>,
    file: Option<PathBuf>,
    terminal: &mut dyn Terminal,
) -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;

    let pairing_key = match (key, file) {
        (Some(token), None) => PairingKey::decode(&token)?,
        (None, Some(path)) => {
            let content = tokio::fs::read_to_string(&path).await?;
            PairingKey::from_json(&content)?
        }
        (Some(_), Some(_)) => anyhow::bail!("Pass the key either inline or with --file, not both"),
        (None, None) => anyhow::bail!("Missing pairing key. Pass it inline or with --file"),
    };

    let connection_name =
        name.unwrap_or_else(|| format!("{}-{}", pairing_key.host, pairing_key.port));
    config::validate_entity_name(&connection_name)?;
    if StandaloneConnection::load(&store, &connection_name)?.is_some() {
        anyhow::bail!(
            "Connection '{}' already exists. Remove it first with 'clonr standalone disconnect {}'",
            connection_name,
            connection_name
        );
    }

    let client_name = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| connection_name.clone());

    let (source_host, source_port) = (pairing_key.host.clone(), pairing_key.port);
    let mut handshake = ClientHandshake::begin(pairing_key, &client_name, Utc::now())?;
    info!(client_id = %handshake.registration().client_id, "handshake started");

    println!("🔐 Pairing with {}:{} as '{}'", source_host, source_port, connection_name);
    println!("   Client ID: {}", handshake.registration().client_id);
    println!("\n   Enter this secret on the source instance:");
    println!("\n       {}\n", handshake.display_secret()?);
    println!("   (clonr standalone accept <secret> on the source)");

    if !terminal.confirm("Has the secret been accepted on the source instance?")? {
        println!("Aborted. Nothing was saved; re-run connect to try again.");
        return Ok(());
    }

    let password = read_new_password(terminal, "local password (protects the pairing secret on this machine)")?;
    handshake.set_local_password(&password)?;

    let connection = handshake.into_connection(&connection_name)?;
    connection.save(&store)?;

    println!("✅ Connected to {}:{}", connection.host, connection.port);
    println!("   Connection name: {}", connection.name);
    Ok(())
}

/// Remove a connection to a remote source.
pub async fn disconnect(name: String, force: bool, terminal: &mut dyn Terminal) -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;

    if StandaloneConnection::load(&store, &name)?.is_none() {
        anyhow::bail!("No connection named '{}'", name);
    }

    if !force
        && !terminal.confirm(&format!(
            "Remove connection '{}'? Synced items will no longer be decryptable.",
            name
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    StandaloneConnection::delete(&store, &name)?;
    println!("✅ Connection '{}' removed", name);
    Ok(())
}

/// Change a registered client's access status.
pub async fn set_client_status(
    client: String,
    action: &str,
    force: bool,
    terminal: &mut dyn Terminal,
) -> Result<()> {
    let config = Config::load_or_init().await?;
    let registry = ClientRegistry::new(config.store()?);

    let target = registry.resolve_client_prefix(&client)?;

    if (action == "revoke" || action == "suspend")
        && !force
        && !terminal.confirm(&format!(
            "{} client '{}' ({})?",
            action, target.client_name, target.client_id
        ))?
    {
        println!("Aborted.");
        return Ok(());
    }

    match action {
        "revoke" => registry.revoke(&target.client_id)?,
        "suspend" => registry.suspend(&target.client_id)?,
        "reactivate" => registry.reactivate(&target.client_id)?,
        other => anyhow::bail!("Unknown client action: {}", other),
    }

    let updated = registry.resolve_client_prefix(&target.client_id.to_string())?;
    println!(
        "✅ Client '{}' is now {}",
        updated.client_name, updated.status
    );
    Ok(())
}

/// Create an encrypted archive of the selected repositories.
pub async fn create_archive(
    paths: Vec<PathBuf>,
    output: Option<PathBuf>,
    no_git: bool,
    compression: Option<u32>,
    exclude: Vec<String>,
    all: bool,
    favorites: bool,
    workspace: Option<String>,
    terminal: &mut dyn Terminal,
) -> Result<()> {
    let config = Config::load_or_init().await?;
    let paths = resolve_archive_paths(&config, paths, all, favorites, workspace.as_deref())?;

    let output = output.unwrap_or_else(|| {
        PathBuf::from(format!(
            "clonr-archive-{}.{}",
            Utc::now().format("%Y%m%d-%H%M%S"),
            archive::ARCHIVE_EXTENSION
        ))
    });

    let password = read_new_password(terminal, "archive password")?;
    let options = ArchiveOptions {
        include_vcs_metadata: !no_git,
        compression_level: compression.unwrap_or(6),
        exclude_patterns: exclude,
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner());
    spinner.set_message(format!("Archiving {} repositories...", paths.len()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let manifest = archive::create(&paths, &output, &password, &options)?;
    spinner.finish_and_clear();

    println!("✅ Archive created: {}", output.display());
    println!(
        "   Repositories: {} | Files: {} | Uncompressed: {} bytes",
        manifest.repositories.len(),
        manifest.repositories.iter().map(|r| r.file_count).sum::<u64>(),
        manifest.total_uncompressed_size
    );
    for entry in &manifest.repositories {
        println!(
            "   📦 {} ({} files{})",
            entry.name,
            entry.file_count,
            entry
                .last_commit
                .as_deref()
                .map(|c| format!(", at {}", &c[..c.len().min(8)]))
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// List or extract an encrypted archive.
pub async fn extract_archive(
    archive_path: PathBuf,
    output: Option<PathBuf>,
    list: bool,
    terminal: &mut dyn Terminal,
) -> Result<()> {
    if !archive_path.exists() {
        anyhow::bail!("Archive not found: {}", archive_path.display());
    }

    let password = terminal.read_password("Archive password: ")?;

    if list {
        let manifest = archive::list(&archive_path, &password)?;
        println!("📦 {} (format v{})", archive_path.display(), manifest.format_version);
        println!(
            "   Created: {} | Checksum: {}...",
            manifest.created_at.to_rfc3339(),
            &manifest.checksum[..16]
        );
        for entry in &manifest.repositories {
            println!(
                "   {} - {} files, {} bytes{}",
                entry.name,
                entry.file_count,
                entry.size,
                entry
                    .source_url
                    .as_deref()
                    .map(|u| format!(" ({})", u))
                    .unwrap_or_default()
            );
        }
        return Ok(());
    }

    let dest = output.unwrap_or_else(|| {
        PathBuf::from(
            archive_path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "extracted".to_string()),
        )
    });

    let manifest = archive::extract(&archive_path, &dest, &password)?;
    println!("✅ Extracted {} repositories to {}", manifest.repositories.len(), dest.display());
    for entry in &manifest.repositories {
        println!("   📂 {}/{} ({} files)", dest.display(), entry.name, entry.file_count);
    }
    Ok(())
}

/// Decrypt stored synced items, per connection.
pub async fn decrypt(
    connection: Option<String>,
    all: bool,
    list: bool,
    terminal: &mut dyn Terminal,
) -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;
    let items = SyncItemStore::new(store.clone());

    if list {
        let stored = items.list(connection.as_deref())?;
        if stored.is_empty() {
            println!("No synced items stored.");
        } else {
            for item in stored {
                let state = match item.state {
                    SyncState::Encrypted => "🔒 encrypted",
                    SyncState::Decrypted => "🔓 decrypted",
                };
                println!(
                    "{}  {}/{}  {}  {}",
                    state, item.data_type, item.name, item.connection_name, item.synced_at
                );
            }
        }
        return Ok(());
    }

    let connections = match (&connection, all) {
        (Some(name), _) => {
            let conn = StandaloneConnection::load(&store, name)?
                .ok_or_else(|| anyhow::anyhow!("No connection named '{}'", name))?;
            vec![conn]
        }
        (None, true) => StandaloneConnection::list(&store)?,
        (None, false) => {
            anyhow::bail!("Pass --connection NAME or --all to select what to decrypt")
        }
    };

    if connections.is_empty() {
        println!("No connections configured.");
        return Ok(());
    }

    for conn in connections {
        println!("🔑 Connection '{}'", conn.name);
        let password =
            terminal.read_password(&format!("Local password for '{}': ", conn.name))?;
        let secret = conn.unlock_secret(&password)?;

        let outcomes = items.decrypt_all(&conn.name, &secret)?;
        if outcomes.is_empty() {
            println!("   No items stored for this connection.");
            continue;
        }

        for outcome in outcomes {
            match (&outcome.result, outcome.already_decrypted) {
                (Ok(()), true) => {
                    println!("   ✓ {}/{} (already decrypted)", outcome.data_type, outcome.item_name)
                }
                (Ok(()), false) => println!("   ✓ {}/{}", outcome.data_type, outcome.item_name),
                (Err(e), _) => {
                    println!("   ✗ {}/{}: {}", outcome.data_type, outcome.item_name, e)
                }
            }
        }
    }
    Ok(())
}

/// Configure, inspect, or rotate the at-rest encryption key.
pub async fn encrypt(command: EncryptCommands, terminal: &mut dyn Terminal) -> Result<()> {
    let config = Config::load_or_init().await?;
    let store = config.store()?;

    match command {
        EncryptCommands::Setup => {
            let password = read_new_password(terminal, "encryption password")?;
            let enc = lifecycle::setup_encryption(&store, &password, Utc::now())?;
            println!("✅ At-rest encryption configured");
            println!("   Key hint: {}", enc.key_hint);
        }
        EncryptCommands::Status => match ServerEncryptionConfig::load(&store)? {
            Some(enc) => {
                let now = Utc::now();
                let age = enc.key_age(now);
                let max_age = Duration::days(config.encryption_key_max_age_days);
                println!("🔐 At-rest encryption status\n");
                println!("   Enabled:    {}", enc.enabled);
                println!("   Key hint:   {}", enc.key_hint);
                println!("   Configured: {}", enc.configured_at.to_rfc3339());
                println!(
                    "   Key age:    {} days (max {})",
                    age.num_days(),
                    max_age.num_days()
                );
                if lifecycle::rotation_due(&enc, max_age, now) {
                    println!("   ⚠️  Key is past its maximum age and due for rotation");
                }
            }
            None => {
                println!("At-rest encryption is not configured.");
                println!("Run: clonr standalone encrypt setup");
            }
        },
        EncryptCommands::Rotate => {
            let registry = ClientRegistry::new(store.clone());
            let password = read_new_password(terminal, "new encryption password")?;
            let enc = lifecycle::rotate_encryption_key(&store, &registry, Some(&password), Utc::now())?;
            println!("✅ At-rest key rotated");
            println!("   New key hint: {}", enc.key_hint);
        }
    }
    Ok(())
}

/// Resolve which repositories an archive command covers.
fn resolve_archive_paths(
    config: &Config,
    explicit: Vec<PathBuf>,
    all: bool,
    favorites: bool,
    workspace: Option<&str>,
) -> Result<Vec<PathBuf>> {
    if !explicit.is_empty() {
        return Ok(explicit);
    }

    let selected: Vec<PathBuf> = config
        .repositories
        .iter()
        .filter(|repo| {
            if all {
                true
            } else if favorites {
                repo.favorite
            } else if let Some(ws) = workspace {
                repo.workspace.as_deref() == Some(ws)
            } else {
                false
            }
        })
        .map(|repo| repo.path.clone())
        .collect();

    if selected.is_empty() {
        if all || favorites || workspace.is_some() {
            anyhow::bail!("No known repositories match the selection");
        }
        anyhow::bail!("No repositories selected. Pass paths or one of --all/--favorites/--workspace");
    }
    Ok(selected)
}

fn format_expiry(config: &ServerPairingConfig, now: chrono::DateTime<Utc>) -> String {
    let remaining = config.expires_in(now);
    if remaining <= Duration::zero() {
        format!("EXPIRED {} ago - run 'clonr standalone rotate'", format_duration(-remaining))
    } else {
        format!("in {}", format_duration(remaining))
    }
}

fn format_duration(d: Duration) -> String {
    if d.num_days() > 0 {
        format!("{}d {}h", d.num_days(), d.num_hours() % 24)
    } else if d.num_hours() > 0 {
        format!("{}h {}m", d.num_hours(), d.num_minutes() % 60)
    } else if d.num_minutes() > 0 {
        format!("{}m", d.num_minutes())
    } else {
        format!("{}s", d.num_seconds())
    }
}

fn format_time_ago(timestamp: chrono::DateTime<Utc>) -> String {
    let duration = Utc::now().signed_duration_since(timestamp);
    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else {
        format!("{} ago", format_duration(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoRecord;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_init() {
        let cli = parse(&[
            "clonr", "standalone", "init", "--host", "10.0.0.1", "--port", "50052",
        ]);
        let Commands::Standalone { command } = cli.command;
        match command {
            StandaloneCommands::Init { host, port, output } => {
                assert_eq!(host.as_deref(), Some("10.0.0.1"));
                assert_eq!(port, Some(50052));
                assert!(output.is_none());
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_accept_variants() {
        let cli = parse(&[
            "clonr", "standalone", "accept", "a1b2c3d4a1b2c3d4", "--client", "ab12",
        ]);
        let Commands::Standalone { command } = cli.command;
        match command {
            StandaloneCommands::Accept { display_key, client, list } => {
                assert_eq!(display_key.as_deref(), Some("a1b2c3d4a1b2c3d4"));
                assert_eq!(client.as_deref(), Some("ab12"));
                assert!(!list);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_archive_flags() {
        let cli = parse(&[
            "clonr", "standalone", "archive", "/repo", "-o", "backup.clonr", "--no-git",
            "--compression", "9", "--exclude", "*.log", "--exclude", "target",
        ]);
        let Commands::Standalone { command } = cli.command;
        match command {
            StandaloneCommands::Archive {
                paths,
                output,
                no_git,
                compression,
                exclude,
                ..
            } => {
                assert_eq!(paths, vec![PathBuf::from("/repo")]);
                assert_eq!(output, Some(PathBuf::from("backup.clonr")));
                assert!(no_git);
                assert_eq!(compression, Some(9));
                assert_eq!(exclude, vec!["*.log".to_string(), "target".to_string()]);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_parse_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["clonr", "standalone", "teleport"]).is_err());
    }

    fn selector_config() -> Config {
        let mut config = Config {
            default_host: "127.0.0.1".to_string(),
            default_port: 50052,
            pairing_key_lifetime_hours: 24,
            encryption_key_max_age_days: 90,
            repositories: Vec::new(),
            config_file_path: PathBuf::new(),
        };
        config.repositories = vec![
            RepoRecord {
                name: "a".into(),
                path: "/repos/a".into(),
                favorite: true,
                workspace: Some("work".into()),
            },
            RepoRecord {
                name: "b".into(),
                path: "/repos/b".into(),
                favorite: false,
                workspace: Some("work".into()),
            },
            RepoRecord {
                name: "c".into(),
                path: "/repos/c".into(),
                favorite: false,
                workspace: None,
            },
        ];
        config
    }

    #[test]
    fn test_resolve_explicit_paths_win() {
        let config = selector_config();
        let paths = resolve_archive_paths(
            &config,
            vec![PathBuf::from("/explicit")],
            true,
            false,
            None,
        )
        .unwrap();
        assert_eq!(paths, vec![PathBuf::from("/explicit")]);
    }

    #[test]
    fn test_resolve_selectors() {
        let config = selector_config();

        let all = resolve_archive_paths(&config, vec![], true, false, None).unwrap();
        assert_eq!(all.len(), 3);

        let favorites = resolve_archive_paths(&config, vec![], false, true, None).unwrap();
        assert_eq!(favorites, vec![PathBuf::from("/repos/a")]);

        let ws = resolve_archive_paths(&config, vec![], false, false, Some("work")).unwrap();
        assert_eq!(ws.len(), 2);
    }

    #[test]
    fn test_resolve_nothing_selected() {
        let config = selector_config();
        assert!(resolve_archive_paths(&config, vec![], false, false, None).is_err());
        assert!(resolve_archive_paths(&config, vec![], false, false, Some("nope")).is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::minutes(5)), "5m");
        assert_eq!(format_duration(Duration::hours(3) + Duration::minutes(20)), "3h 20m");
        assert_eq!(format_duration(Duration::days(2) + Duration::hours(4)), "2d 4h");
    }
}
