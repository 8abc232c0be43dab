//! # Pairing Handshake
//!
//! The two-sided protocol that turns "I have a pairing key" into "I am a
//! registered, trusted client".
//!
//! Trust is established on first use via out-of-band human transcription:
//! the client displays a short secret, and the operator retypes it on the
//! server. No secret ever crosses the network during pairing, which is
//! the point - the weak link is moved to a channel the attacker does not
//! control. This property is deliberate and must not be replaced with a
//! network-negotiated exchange.
//!
//! Client side: `Idle -> KeyGenerated -> AwaitingServerConfirmation ->
//! LocalPasswordSet -> Connected`.
//! Server side: `NoPending -> PendingClientAnnounced -> KeyEntered ->
//! Registered`.
//!
//! Nothing is persisted on either side before its validation step passes,
//! so an aborted handshake leaves no partial records behind.

use crate::config::Store;
use crate::crypto::{self, Encrypted, KdfParams, SymmetricKey, PAIRING_SECRET_LEN};
use crate::error::{Result, StandaloneError};
use crate::pairing::PairingKey;
use crate::registry::{
    ClientRegistry, MachineInfo, PendingClientRegistration, PendingState, RegisteredClient,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-side progress through the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientHandshakeState {
    Idle,
    KeyGenerated,
    AwaitingServerConfirmation,
    LocalPasswordSet,
    Connected,
}

/// Sync status of an established connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Connected,
    Disconnected,
}

/// Client-side record of a paired source instance.
///
/// The pairing secret is stored encrypted under a key derived from the
/// operator's local password - which is independent of the secret itself
/// and never leaves this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandaloneConnection {
    pub name: String,
    pub instance_id: Uuid,
    pub host: String,
    pub port: u16,
    pub encrypted_peer_credential: Encrypted,
    pub local_kdf: KdfParams,
    pub sync_status: SyncStatus,
}

impl StandaloneConnection {
    pub fn load(store: &Store, name: &str) -> Result<Option<Self>> {
        store.get(&connection_key(name))
    }

    pub fn save(&self, store: &Store) -> Result<()> {
        store.put(&connection_key(&self.name), self)
    }

    pub fn delete(store: &Store, name: &str) -> Result<bool> {
        store.delete(&connection_key(name))
    }

    pub fn list(store: &Store) -> Result<Vec<Self>> {
        store.list("connections")
    }

    /// Recover the pairing secret with the local password.
    pub fn unlock_secret(&self, password: &str) -> Result<String> {
        let key = crypto::derive_password_key(password.as_bytes(), &self.local_kdf)?;
        let bytes = crypto::decrypt(&key, &self.encrypted_peer_credential)
            .map_err(|_| StandaloneError::WrongPassword)?;
        String::from_utf8(bytes)
            .map_err(|_| StandaloneError::Integrity("stored secret is not valid UTF-8".to_string()))
    }
}

/// Driver for the client side of the handshake.
///
/// Holds everything in memory; the only durable write happens in
/// [`ClientHandshake::into_connection`], after the operator has confirmed
/// the server accepted the secret and has set a local password.
pub struct ClientHandshake {
    state: ClientHandshakeState,
    key: PairingKey,
    registration: PendingClientRegistration,
    secret: String,
    encrypted_secret: Option<Encrypted>,
    local_kdf: Option<KdfParams>,
}

impl std::fmt::Debug for ClientHandshake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientHandshake")
            .field("state", &self.state)
            .field("secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl ClientHandshake {
    /// Step 1-2: validate the pairing key, describe this machine, and
    /// generate the fresh pairing secret.
    ///
    /// Decode/validate failure aborts here, before any state exists.
    pub fn begin(key: PairingKey, client_name: &str, now: DateTime<Utc>) -> Result<Self> {
        key.validate(now)?;

        let registration = PendingClientRegistration {
            client_id: Uuid::new_v4(),
            client_name: client_name.to_string(),
            machine_info: MachineInfo::current(),
            initiated_at: now,
            state: PendingState::Announced,
        };

        Ok(Self {
            state: ClientHandshakeState::KeyGenerated,
            key,
            registration,
            secret: crypto::generate_pairing_secret(),
            encrypted_secret: None,
            local_kdf: None,
        })
    }

    pub fn state(&self) -> ClientHandshakeState {
        self.state
    }

    /// The registration this client announces to the server.
    pub fn registration(&self) -> &PendingClientRegistration {
        &self.registration
    }

    /// Step 3: hand out the secret for display and start waiting for the
    /// operator to confirm it was entered on the server.
    pub fn display_secret(&mut self) -> Result<&str> {
        if self.state != ClientHandshakeState::KeyGenerated {
            return Err(StandaloneError::OutOfSequence(
                "secret can only be displayed once after key validation".to_string(),
            ));
        }
        self.state = ClientHandshakeState::AwaitingServerConfirmation;
        Ok(&self.secret)
    }

    /// Step 6a: derive a local-only key from the operator's password and
    /// encrypt this side's copy of the pairing secret with it.
    pub fn set_local_password(&mut self, password: &str) -> Result<()> {
        if self.state != ClientHandshakeState::AwaitingServerConfirmation {
            return Err(StandaloneError::OutOfSequence(
                "local password comes after server confirmation".to_string(),
            ));
        }

        let kdf = KdfParams::new();
        let key = crypto::derive_password_key(password.as_bytes(), &kdf)?;
        self.encrypted_secret = Some(crypto::encrypt(&key, self.secret.as_bytes())?);
        self.local_kdf = Some(kdf);
        self.state = ClientHandshakeState::LocalPasswordSet;
        Ok(())
    }

    /// Step 6b: produce the durable connection record.
    pub fn into_connection(mut self, connection_name: &str) -> Result<StandaloneConnection> {
        if self.state != ClientHandshakeState::LocalPasswordSet {
            return Err(StandaloneError::OutOfSequence(
                "connection is only persisted after the local password is set".to_string(),
            ));
        }
        self.state = ClientHandshakeState::Connected;

        Ok(StandaloneConnection {
            name: connection_name.to_string(),
            instance_id: self.key.instance_id,
            host: self.key.host.clone(),
            port: self.key.port,
            encrypted_peer_credential: self.encrypted_secret.take().expect("set with password"),
            local_kdf: self.local_kdf.take().expect("set with password"),
            sync_status: SyncStatus::Connected,
        })
    }
}

/// Record a remote client's announcement on the server.
///
/// This is the narrow entry point the transport layer calls when a peer
/// starts a handshake.
pub fn announce(registry: &ClientRegistry, registration: &PendingClientRegistration) -> Result<()> {
    registry.add_pending(registration)
}

/// Steps 4-5: the server operator accepts a pending client.
///
/// The entered secret is the value read off the client's screen. The
/// server stores a one-way hint of it plus an encrypted copy under the
/// at-rest key; the plaintext secret itself is never persisted.
pub fn accept(
    registry: &ClientRegistry,
    server_key: &SymmetricKey,
    selector: Option<&str>,
    entered_secret: &str,
    now: DateTime<Utc>,
) -> Result<RegisteredClient> {
    let secret = normalize_secret(entered_secret)?;

    let mut pending = match registry.select_pending(selector) {
        Ok(pending) => pending,
        Err(StandaloneError::NotFound(msg)) => {
            // A second accept for a client that already completed the
            // handshake is an idempotency violation, not a missing client.
            if let Some(prefix) = selector {
                if let Ok(existing) = registry.resolve_client_prefix(prefix) {
                    return Err(StandaloneError::AlreadyRegistered(
                        existing.client_id.to_string(),
                    ));
                }
            }
            return Err(StandaloneError::NotFound(msg));
        }
        Err(e) => return Err(e),
    };

    pending.state = PendingState::KeyEntered;
    registry.update_pending(&pending)?;

    let client = RegisteredClient {
        client_id: pending.client_id,
        client_name: pending.client_name,
        key_hint: crypto::key_hint(&secret),
        status: crate::registry::ClientStatus::Active,
        machine_info: pending.machine_info,
        registered_at: now,
        last_seen_at: None,
        sync_count: 0,
        last_ip: None,
        encrypted_secret: crypto::encrypt(server_key, secret.as_bytes())?,
    };

    registry.register(&client)?;
    Ok(client)
}

fn normalize_secret(entered: &str) -> Result<String> {
    let secret = entered.trim().to_lowercase();
    if secret.len() != PAIRING_SECRET_LEN || !secret.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(StandaloneError::Decode(format!(
            "pairing secret must be {} hexadecimal characters",
            PAIRING_SECRET_LEN
        )));
    }
    Ok(secret)
}

fn connection_key(name: &str) -> String {
    format!("connections/{}", name)
}
