//! # Key Lifecycle Management
//!
//! Issuance, rotation, and retirement of the two long-lived key kinds:
//! - the pairing key (`init` / `rotate` / `disable`), where rotation
//!   invalidates the previous key and drops handshakes still pending
//!   under it, while registered clients are unaffected
//! - the at-rest server encryption key (`encrypt setup|status|rotate`),
//!   with a background scheduler that re-keys it once it exceeds the
//!   configured maximum age
//!
//! The scheduler is an explicit handle with start/stop semantics, owned
//! by the process composition root. It never blocks foreground work.

use crate::config::Store;
use crate::crypto::{self, KdfParams, SymmetricKey};
use crate::error::{Result, StandaloneError};
use crate::pairing::{PairingKey, ServerPairingConfig};
use crate::registry::ClientRegistry;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Store key for the singleton encryption configuration.
const ENCRYPTION_CONFIG_KEY: &str = "server_encryption";

/// File holding the raw at-rest key so accept/sync/rotation can run
/// without re-prompting for the setup password.
const ENCRYPTION_KEY_FILE: &str = "server_encryption.key";

/// Persisted configuration of the at-rest encryption key.
///
/// Must exist and be enabled before any client-specific payload
/// encryption can occur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEncryptionConfig {
    pub enabled: bool,
    pub key_hint: String,
    pub configured_at: DateTime<Utc>,
    pub derivation_params: KdfParams,
}

#[derive(Serialize, Deserialize)]
struct EncryptionKeyFile {
    key: [u8; 32],
}

impl ServerEncryptionConfig {
    pub fn load(store: &Store) -> Result<Option<Self>> {
        store.get(ENCRYPTION_CONFIG_KEY)
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        store.put(ENCRYPTION_CONFIG_KEY, self)
    }

    /// Age of the current key.
    pub fn key_age(&self, now: DateTime<Utc>) -> Duration {
        now - self.configured_at
    }
}

/// Initialize pairing for this instance.
///
/// Fails with `AlreadyExists` when a pairing configuration is already
/// present; `rotate` is the explicit path to replace it.
pub fn init_pairing(
    store: &Store,
    host: &str,
    port: u16,
    lifetime: Duration,
) -> Result<(PairingKey, ServerPairingConfig)> {
    if ServerPairingConfig::load(store)?.is_some() {
        return Err(StandaloneError::AlreadyExists(
            "pairing configuration".to_string(),
        ));
    }

    let (key, config) = PairingKey::generate(host, port, lifetime);
    config.save(store)?;
    info!(instance_id = %config.instance_id, "pairing initialized");
    Ok((key, config))
}

/// Invalidate the current pairing key and issue a new one.
///
/// Handshakes still pending under the old key are dropped; registered
/// clients keep working because their secrets are independent of the
/// pairing key.
pub fn rotate_pairing(
    store: &Store,
    registry: &ClientRegistry,
    host: &str,
    port: u16,
    lifetime: Duration,
) -> Result<(PairingKey, ServerPairingConfig)> {
    let previous = ServerPairingConfig::load(store)?.ok_or_else(|| {
        StandaloneError::NotInitialized("run 'clonr standalone init' first".to_string())
    })?;

    let dropped = registry.pending()?;
    for pending in &dropped {
        registry.remove_pending(&pending.client_id)?;
    }

    let (key, config) = PairingKey::generate(host, port, lifetime);
    config.save(store)?;
    info!(
        old_instance_id = %previous.instance_id,
        new_instance_id = %config.instance_id,
        dropped_pending = dropped.len(),
        "pairing key rotated"
    );
    Ok((key, config))
}

/// Disable pairing entirely, deleting the server configuration.
pub fn disable_pairing(store: &Store) -> Result<bool> {
    ServerPairingConfig::delete(store)
}

/// Configure at-rest encryption from an operator password.
pub fn setup_encryption(
    store: &Store,
    password: &str,
    now: DateTime<Utc>,
) -> Result<ServerEncryptionConfig> {
    if ServerEncryptionConfig::load(store)?.is_some() {
        return Err(StandaloneError::AlreadyExists(
            "encryption configuration".to_string(),
        ));
    }

    let params = KdfParams::new();
    let key = crypto::derive_password_key(password.as_bytes(), &params)?;

    let config = ServerEncryptionConfig {
        enabled: true,
        key_hint: crypto::key_hint(&hex::encode(key.as_bytes())),
        configured_at: now,
        derivation_params: params,
    };
    save_encryption_key(store, &key)?;
    config.save(store)?;
    info!(key_hint = %config.key_hint, "at-rest encryption configured");
    Ok(config)
}

/// Load the at-rest encryption key.
///
/// The key file must agree with the configured key hint; a mismatch
/// means the two were edited independently and neither can be trusted.
pub fn load_encryption_key(store: &Store) -> Result<SymmetricKey> {
    let path = encryption_key_path(store);
    if !path.exists() {
        return Err(StandaloneError::NotInitialized(
            "run 'clonr standalone encrypt setup' first".to_string(),
        ));
    }
    let content = std::fs::read_to_string(&path)?;
    let file: EncryptionKeyFile = toml::from_str(&content)
        .map_err(|e| StandaloneError::Integrity(format!("corrupt key file: {}", e)))?;
    let key = SymmetricKey::from_bytes(file.key);

    if let Some(config) = ServerEncryptionConfig::load(store)? {
        let hint = crypto::key_hint(&hex::encode(key.as_bytes()));
        if !crypto::hints_match(&hint, &config.key_hint) {
            return Err(StandaloneError::Integrity(
                "encryption key file does not match the configured key hint".to_string(),
            ));
        }
    }
    Ok(key)
}

/// Replace the at-rest encryption key.
///
/// With a password, the new key is derived from it with fresh parameters;
/// without one (the scheduled path) the new key is random. Every
/// registered client's stored secret is re-encrypted under the new key in
/// the same pass, so the registry stays readable.
pub fn rotate_encryption_key(
    store: &Store,
    registry: &ClientRegistry,
    password: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ServerEncryptionConfig> {
    let mut config = ServerEncryptionConfig::load(store)?.ok_or_else(|| {
        StandaloneError::NotInitialized("run 'clonr standalone encrypt setup' first".to_string())
    })?;
    let old_key = load_encryption_key(store)?;

    let params = KdfParams::new();
    let new_key = match password {
        Some(password) => crypto::derive_password_key(password.as_bytes(), &params)?,
        None => SymmetricKey::generate(),
    };

    // Re-encrypt stored client secrets before the new key becomes
    // authoritative; a failure here leaves the old key file in place.
    let mut reencrypted = Vec::new();
    for client in registry.list(true)? {
        let secret = crypto::decrypt(&old_key, &client.encrypted_secret).map_err(|_| {
            StandaloneError::Integrity(format!(
                "stored secret for client {} does not decrypt under the current key",
                client.client_id
            ))
        })?;
        let mut updated = client;
        updated.encrypted_secret = crypto::encrypt(&new_key, &secret)?;
        reencrypted.push(updated);
    }

    save_encryption_key(store, &new_key)?;
    for client in &reencrypted {
        store.put(&format!("clients/{}", client.client_id), client)?;
    }

    config.key_hint = crypto::key_hint(&hex::encode(new_key.as_bytes()));
    config.configured_at = now;
    config.derivation_params = params;
    config.save(store)?;
    info!(key_hint = %config.key_hint, clients = reencrypted.len(), "at-rest key rotated");
    Ok(config)
}

/// Whether the configured key has exceeded its maximum age.
pub fn rotation_due(config: &ServerEncryptionConfig, max_age: Duration, now: DateTime<Utc>) -> bool {
    config.enabled && config.key_age(now) >= max_age
}

fn encryption_key_path(store: &Store) -> PathBuf {
    store.root().join(ENCRYPTION_KEY_FILE)
}

fn save_encryption_key(store: &Store, key: &SymmetricKey) -> Result<()> {
    let path = encryption_key_path(store);
    let content = toml::to_string_pretty(&EncryptionKeyFile {
        key: *key.as_bytes(),
    })
    .map_err(|e| StandaloneError::Integrity(e.to_string()))?;
    std::fs::write(&path, content)?;

    // Restrict to the owning user
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&path, perms)?;
    }

    Ok(())
}

/// Background ticker that rotates the at-rest key when it exceeds the
/// configured maximum age.
///
/// Owned by the composition root; `stop()` shuts the task down
/// deterministically without affecting in-flight foreground operations.
pub struct RotationScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RotationScheduler {
    /// Start the scheduler with the standard hourly check interval.
    pub fn start(store: Store, registry: ClientRegistry, max_age: Duration) -> Self {
        Self::start_with_interval(store, registry, max_age, std::time::Duration::from_secs(3600))
    }

    /// Start with a custom check interval.
    pub fn start_with_interval(
        store: Store,
        registry: ClientRegistry,
        max_age: Duration,
        tick: std::time::Duration,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = check_rotation(&store, &registry, max_age) {
                            warn!("scheduled key rotation check failed: {}", e);
                        }
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Stop the scheduler and wait for the task to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

fn check_rotation(store: &Store, registry: &ClientRegistry, max_age: Duration) -> Result<()> {
    let Some(config) = ServerEncryptionConfig::load(store)? else {
        return Ok(());
    };
    let now = Utc::now();
    if rotation_due(&config, max_age, now) {
        info!(
            age_days = config.key_age(now).num_days(),
            "at-rest key exceeded maximum age, rotating"
        );
        rotate_encryption_key(store, registry, None, now)?;
    }
    Ok(())
}
