//! # Encrypted Sync Payload Pipeline
//!
//! Per-item encryption and decryption of synchronized data. Only data
//! flagged sensitive (credentials, tokens) is encrypted per client; bulk
//! data such as repository records and workspace descriptors is exchanged
//! in plain form. That is an explicit trust boundary of the sync design,
//! not an oversight.
//!
//! Every item records the salt its key was derived with, so the same key
//! can be re-derived at decryption time. The `encrypted -> decrypted`
//! state transition commits only after authenticated decryption succeeds;
//! a failed item stays `encrypted` and reports its own error without
//! aborting the rest of the batch.

use crate::config::Store;
use crate::crypto::{self, SymmetricKey};
use crate::error::{Result, StandaloneError};
use crate::registry::{ClientRegistry, ClientStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a synced item. Never regresses to `Encrypted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Encrypted,
    Decrypted,
}

/// One unit of data transferred between paired instances.
///
/// While `state` is `Encrypted`, `payload` holds AES-GCM ciphertext and
/// `nonce` the value it was sealed with. After a successful decrypt,
/// `payload` holds the plaintext and the nonce is cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedDataItem {
    pub connection_name: String,
    pub data_type: String,
    pub name: String,
    pub state: SyncState,
    pub synced_at: DateTime<Utc>,
    pub derivation_salt: [u8; 16],
    pub nonce: Option<[u8; 12]>,
    pub payload: Vec<u8>,
}

impl SyncedDataItem {
    /// The plaintext, if this item has been decrypted.
    pub fn plaintext(&self) -> Option<&[u8]> {
        match self.state {
            SyncState::Decrypted => Some(&self.payload),
            SyncState::Encrypted => None,
        }
    }

    fn store_key(&self) -> String {
        item_key(&self.connection_name, &self.data_type, &self.name)
    }
}

/// Encrypt a sensitive payload destined for a registered client.
///
/// The registry is consulted first and is the single authority: anything
/// but an `active` status fails with `ClientNotActive` before any key
/// material is touched.
pub fn encrypt_for_client(
    registry: &ClientRegistry,
    server_key: &SymmetricKey,
    client_id: &Uuid,
    data_type: &str,
    name: &str,
    plaintext: &[u8],
) -> Result<SyncedDataItem> {
    let client = registry.get(client_id)?.ok_or_else(|| {
        StandaloneError::NotFound(format!("no registered client with ID: {}", client_id))
    })?;
    if client.status != ClientStatus::Active {
        return Err(StandaloneError::ClientNotActive {
            client_id: client_id.to_string(),
            status: client.status.to_string(),
        });
    }

    let secret_bytes = crypto::decrypt(server_key, &client.encrypted_secret).map_err(|_| {
        StandaloneError::Integrity(format!(
            "stored secret for client {} does not decrypt under the server key",
            client_id
        ))
    })?;
    let secret = String::from_utf8(secret_bytes)
        .map_err(|_| StandaloneError::Integrity("stored secret is not valid UTF-8".to_string()))?;

    let salt = crypto::generate_salt();
    let client_key = crypto::derive_client_key(&secret, &salt)?;
    let encrypted = crypto::encrypt(&client_key, plaintext)?;

    Ok(SyncedDataItem {
        connection_name: client.client_name,
        data_type: data_type.to_string(),
        name: name.to_string(),
        state: SyncState::Encrypted,
        synced_at: Utc::now(),
        derivation_salt: salt,
        nonce: Some(encrypted.nonce),
        payload: encrypted.ciphertext,
    })
}

/// Decrypt an item in place using the pairing secret.
///
/// The key is re-derived from the salt persisted at encryption time.
/// Idempotent: an already-decrypted item returns its stored plaintext
/// without a second decryption attempt. On integrity failure the item is
/// left untouched in the `Encrypted` state.
pub fn decrypt_item(item: &mut SyncedDataItem, secret: &str) -> Result<Vec<u8>> {
    if item.state == SyncState::Decrypted {
        return Ok(item.payload.clone());
    }

    let nonce = item.nonce.ok_or_else(|| {
        StandaloneError::Integrity(format!("item '{}' has no nonce recorded", item.name))
    })?;
    let key = crypto::derive_client_key(secret, &item.derivation_salt)?;
    let plaintext = crypto::decrypt(
        &key,
        &crypto::Encrypted {
            nonce,
            ciphertext: item.payload.clone(),
        },
    )
    .map_err(|_| {
        StandaloneError::Integrity(format!(
            "authenticated decryption failed for item '{}'",
            item.name
        ))
    })?;

    item.payload = plaintext.clone();
    item.nonce = None;
    item.state = SyncState::Decrypted;
    Ok(plaintext)
}

/// Persistence for synced items, one document per
/// `(connection, data_type, name)`.
#[derive(Clone)]
pub struct SyncItemStore {
    store: Store,
}

/// Outcome of one item in a batch decrypt.
pub struct DecryptOutcome {
    pub item_name: String,
    pub data_type: String,
    pub result: Result<()>,
    pub already_decrypted: bool,
}

impl SyncItemStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn save(&self, item: &SyncedDataItem) -> Result<()> {
        self.store.put(&item.store_key(), item)
    }

    pub fn list(&self, connection: Option<&str>) -> Result<Vec<SyncedDataItem>> {
        match connection {
            Some(name) => self.store.list(&format!("synced/{}", name)),
            None => {
                let root = self.store.root().join("synced");
                if !root.exists() {
                    return Ok(Vec::new());
                }
                let mut items = Vec::new();
                let mut dirs: Vec<_> = std::fs::read_dir(&root)?
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().is_dir())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect();
                dirs.sort();
                for dir in dirs {
                    items.extend(self.store.list::<SyncedDataItem>(&format!("synced/{}", dir))?);
                }
                Ok(items)
            }
        }
    }

    /// Decrypt every stored encrypted item for a connection.
    ///
    /// Failures are collected per item; one bad item never aborts the
    /// remaining batch. Successfully decrypted items are persisted in
    /// their new state before the next item is attempted.
    pub fn decrypt_all(&self, connection: &str, secret: &str) -> Result<Vec<DecryptOutcome>> {
        let mut outcomes = Vec::new();

        for mut item in self.list(Some(connection))? {
            let already_decrypted = item.state == SyncState::Decrypted;
            let result = decrypt_item(&mut item, secret).map(|_| ());
            if result.is_ok() && !already_decrypted {
                self.save(&item)?;
            }
            outcomes.push(DecryptOutcome {
                item_name: item.name.clone(),
                data_type: item.data_type.clone(),
                result,
                already_decrypted,
            });
        }
        Ok(outcomes)
    }
}

fn item_key(connection: &str, data_type: &str, name: &str) -> String {
    format!("synced/{}/{}-{}", connection, data_type, name)
}
