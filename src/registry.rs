//! # Client Registry & Access Control
//!
//! Durable record of pending and accepted clients. The registry is the
//! single authority consulted before any sync payload is encrypted for or
//! decrypted from a client.
//!
//! Registered clients are never physically deleted: revocation and
//! suspension are status writes, so the audit history of every client
//! that ever paired stays inspectable.

use crate::config::Store;
use crate::crypto::Encrypted;
use crate::error::{Result, StandaloneError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Description of the machine a client runs on, captured at handshake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    pub hostname: String,
    pub os: String,
    pub arch: String,
    pub tool_version: String,
}

impl MachineInfo {
    /// Capture the local machine's description.
    pub fn current() -> Self {
        Self {
            hostname: hostname::get()
                .map(|h| h.to_string_lossy().to_string())
                .unwrap_or_else(|_| "unknown".to_string()),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Server-side progress of a not-yet-accepted client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    Announced,
    KeyEntered,
}

/// A client that has started the handshake but has not been accepted yet.
///
/// Consumed (promoted or dropped) by `accept`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClientRegistration {
    pub client_id: Uuid,
    pub client_name: String,
    pub machine_info: MachineInfo,
    pub initiated_at: DateTime<Utc>,
    pub state: PendingState,
}

/// Access-control status of a registered client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Suspended,
    Revoked,
}

impl std::fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClientStatus::Active => "active",
            ClientStatus::Suspended => "suspended",
            ClientStatus::Revoked => "revoked",
        };
        write!(f, "{}", s)
    }
}

/// A client that completed the handshake.
///
/// `key_hint` is a one-way derivation of the pairing secret, for human
/// disambiguation only. The secret itself is retained encrypted at rest
/// under the server encryption key because payload encryption for this
/// client derives from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClient {
    pub client_id: Uuid,
    pub client_name: String,
    pub key_hint: String,
    pub status: ClientStatus,
    pub machine_info: MachineInfo,
    pub registered_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub sync_count: u64,
    pub last_ip: Option<String>,
    pub encrypted_secret: Encrypted,
}

/// Persistent registry of pending and registered clients.
#[derive(Clone)]
pub struct ClientRegistry {
    store: Store,
}

impl ClientRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Record a client that has announced itself for pairing.
    pub fn add_pending(&self, registration: &PendingClientRegistration) -> Result<()> {
        let key = pending_key(&registration.client_id);
        if self
            .store
            .get::<PendingClientRegistration>(&key)?
            .is_some()
        {
            return Err(StandaloneError::AlreadyExists(format!(
                "pending registration for client {}",
                registration.client_id
            )));
        }
        if self.get(&registration.client_id)?.is_some() {
            return Err(StandaloneError::AlreadyRegistered(
                registration.client_id.to_string(),
            ));
        }
        self.store.put(&key, registration)
    }

    pub fn pending(&self) -> Result<Vec<PendingClientRegistration>> {
        self.store.list("pending")
    }

    /// Overwrite an existing pending registration (state transitions).
    pub fn update_pending(&self, registration: &PendingClientRegistration) -> Result<()> {
        let key = pending_key(&registration.client_id);
        if self
            .store
            .get::<PendingClientRegistration>(&key)?
            .is_none()
        {
            return Err(StandaloneError::NotFound(format!(
                "no pending registration for client {}",
                registration.client_id
            )));
        }
        self.store.put(&key, registration)
    }

    pub fn remove_pending(&self, client_id: &Uuid) -> Result<bool> {
        self.store.delete(&pending_key(client_id))
    }

    /// Select exactly one pending registration.
    ///
    /// With no prefix, succeeds only when a single client is pending. With
    /// a prefix, succeeds only when it matches a single client ID. Any
    /// other outcome fails closed - the server never guesses which client
    /// the operator meant.
    pub fn select_pending(&self, prefix: Option<&str>) -> Result<PendingClientRegistration> {
        let pending = self.pending()?;

        let matches: Vec<PendingClientRegistration> = match prefix {
            Some(p) => pending
                .into_iter()
                .filter(|r| r.client_id.to_string().starts_with(p))
                .collect(),
            None => pending,
        };

        match matches.len() {
            0 => Err(StandaloneError::NotFound(match prefix {
                Some(p) => format!("no pending client found with ID prefix: {}", p),
                None => "no pending client registrations".to_string(),
            })),
            1 => Ok(matches.into_iter().next().unwrap()),
            n => Err(StandaloneError::AmbiguousSelection { count: n }),
        }
    }

    /// Promote a pending client into the registered set.
    ///
    /// The write order matters: the registered record is durable before
    /// the pending one is removed, so an interrupt in between leaves a
    /// record that is already valid rather than a client that vanished.
    pub fn register(&self, client: &RegisteredClient) -> Result<()> {
        if self.get(&client.client_id)?.is_some() {
            return Err(StandaloneError::AlreadyRegistered(
                client.client_id.to_string(),
            ));
        }
        self.store.put(&client_key(&client.client_id), client)?;
        self.remove_pending(&client.client_id)?;
        Ok(())
    }

    pub fn get(&self, client_id: &Uuid) -> Result<Option<RegisteredClient>> {
        self.store.get(&client_key(client_id))
    }

    /// List registered clients. With `include_suspended` false only active
    /// clients are returned; with it true, suspended and revoked records
    /// are included as well.
    pub fn list(&self, include_suspended: bool) -> Result<Vec<RegisteredClient>> {
        let clients: Vec<RegisteredClient> = self.store.list("clients")?;
        Ok(clients
            .into_iter()
            .filter(|c| include_suspended || c.status == ClientStatus::Active)
            .collect())
    }

    pub fn revoke(&self, client_id: &Uuid) -> Result<()> {
        self.set_status(client_id, ClientStatus::Revoked)
    }

    pub fn suspend(&self, client_id: &Uuid) -> Result<()> {
        self.set_status(client_id, ClientStatus::Suspended)
    }

    pub fn reactivate(&self, client_id: &Uuid) -> Result<()> {
        self.set_status(client_id, ClientStatus::Active)
    }

    /// Record sync activity from a client.
    pub fn touch(&self, client_id: &Uuid, ip: &str, now: DateTime<Utc>) -> Result<()> {
        let mut client = self.require(client_id)?;
        client.last_seen_at = Some(now);
        client.sync_count += 1;
        client.last_ip = Some(ip.to_string());
        self.store.put(&client_key(client_id), &client)
    }

    fn set_status(&self, client_id: &Uuid, status: ClientStatus) -> Result<()> {
        let mut client = self.require(client_id)?;
        client.status = status;
        self.store.put(&client_key(client_id), &client)
    }

    fn require(&self, client_id: &Uuid) -> Result<RegisteredClient> {
        self.get(client_id)?.ok_or_else(|| {
            StandaloneError::NotFound(format!("no registered client with ID: {}", client_id))
        })
    }

    /// Resolve a client ID prefix against registered clients.
    pub fn resolve_client_prefix(&self, prefix: &str) -> Result<RegisteredClient> {
        let matches: Vec<RegisteredClient> = self
            .list(true)?
            .into_iter()
            .filter(|c| c.client_id.to_string().starts_with(prefix))
            .collect();

        match matches.len() {
            0 => Err(StandaloneError::NotFound(format!(
                "no registered client with ID prefix: {}",
                prefix
            ))),
            1 => Ok(matches.into_iter().next().unwrap()),
            n => Err(StandaloneError::AmbiguousSelection { count: n }),
        }
    }
}

fn pending_key(client_id: &Uuid) -> String {
    format!("pending/{}", client_id)
}

fn client_key(client_id: &Uuid) -> String {
    format!("clients/{}", client_id)
}
